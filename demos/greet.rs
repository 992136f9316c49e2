use fanout::{prelude::*, Error, RegistryConfig, TokioExecutor};

// Define your events
#[derive(Event, Debug)]
enum Greeting {
    Hello(String),
    Goodbye(String),
}

#[derive(Debug, thiserror::Error)]
#[error("refusing to greet an empty name")]
struct EmptyName;

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let registry = Registry::new(RegistryConfig::default().with_namespace("greeter"));

    // Typed subscriber: the emitted event is always the first argument
    registry.subscribe(
        [EventKey::of::<Greeting>()],
        Workflow::new(|e| {
            let text = match e.event_as::<Greeting>() {
                Some(Greeting::Hello(name)) if name.is_empty() => return Err(EmptyName.into()),
                Some(Greeting::Hello(name)) => format!("Hello, {name}!"),
                Some(Greeting::Goodbye(name)) => format!("Goodbye, {name}!"),
                None => return Ok(None),
            };
            Ok(Some(text))
        })
        .on_success(|text| {
            if let Some(text) = text {
                println!("{text}");
            }
            Ok(())
        })
        .on_failure(|err| {
            println!("greeting failed: {err}");
            Ok(())
        })
        .label("greeter"),
    )?;

    // Wildcard audit, built step by step
    registry.context([EventKey::Any]).enter(|scope| {
        scope
            .on_event(|e| Ok(e.meta().id()))
            .on_success(|id| {
                println!("audited emission {id:032x}");
                Ok(())
            });
        Ok::<_, Error>(())
    })?;

    let emitter = Emitter::builder(registry)
        .executor(TokioExecutor::current()?)
        .build();

    emitter.trigger(Greeting::Hello("World".into()));
    emitter.trigger(Greeting::Hello(String::new()));
    emitter.trigger(Greeting::Goodbye("World".into()));
    emitter.emit("untyped", fanout::args![1, 2, 3]);

    // Handlers run as tokio tasks; give them a moment before exiting
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    Ok(())
}
