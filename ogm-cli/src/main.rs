use std::{
    env,
    io::{self, Write},
    str::FromStr,
};

use ogm::{
    config::{Configuration, ConfigurationBuilder, FileConfigurationSource},
    error::OgmResult,
    model::{Node, NodeId, Properties, Value},
    Entity, Session, SessionFactory,
};
use tracing::info;

#[tokio::main]
async fn main() -> OgmResult<()> {
    setup_tracing();

    let config = load_config().await?;
    let factory = SessionFactory::new(config)?;
    let mut session = factory.open_session();

    loop {
        println!(
            "Pick a command: `save`, `update`, `load`, `list`, `delete`, `count`, \
             `begin`, `commit`, `rollback` or `quit`."
        );
        let prompt = if session.in_transaction() { "tx> " } else { "cmd> " };
        let result = match &*input::<String>(prompt) {
            "save" => {
                let mut person = Person {
                    id: None,
                    name: input("name (text)> "),
                    age: input("age (int)> "),
                };
                session.save(&mut person).await.map(|()| {
                    if let Some(id) = person.id {
                        println!("saved as {id}");
                    }
                })
            }
            "update" => {
                let id = NodeId::new(input("id (int)> "));
                update(&mut session, id).await
            }
            "load" => {
                let id = NodeId::new(input("id (int)> "));
                session.load::<Person>(id).await.map(|person| match person {
                    Some(person) => print_people(&[person]),
                    None => println!("no person {id}"),
                })
            }
            "list" => session
                .load_all::<Person>()
                .await
                .map(|people| print_people(&people)),
            "delete" => {
                let id = NodeId::new(input("id (int)> "));
                let person = Person {
                    id: Some(id),
                    name: String::new(),
                    age: 0,
                };
                session.delete(&person).await.map(|deleted| {
                    println!("{}", if deleted { "ok" } else { "not found" });
                })
            }
            "count" => session
                .count::<Person>()
                .await
                .map(|count| println!("{count} people")),
            "begin" => session
                .begin_transaction()
                .await
                .map(|tx| println!("began {tx}")),
            "commit" => session.commit().await.map(|()| println!("ok")),
            "rollback" => session.rollback().await.map(|()| println!("ok")),
            "quit" => break,
            _ => {
                println!("invalid option; try again.");
                Ok(())
            }
        };
        if let Err(error) = result {
            println!("error: {error}");
            if let Some(tx) = session.transaction() {
                println!("transaction {} is {}", tx.handle(), tx.status());
            }
        }
    }

    session.close().await;
    factory.close().await;
    Ok(())
}

/// Reads the configuration file named by `OGM_CONFIG`, or falls back to the
/// URI in `OGM_URI` (an in-memory store by default).
async fn load_config() -> OgmResult<Configuration> {
    if let Ok(location) = env::var("OGM_CONFIG") {
        info!(%location, "loading configuration");
        let source = FileConfigurationSource::load(&location).await?;
        return ConfigurationBuilder::from_source(&source)?.build();
    }
    let uri = env::var("OGM_URI").unwrap_or_else(|_| "memory://local".into());
    Configuration::builder().uri(uri).build()
}

async fn update(session: &mut Session, id: NodeId) -> OgmResult<()> {
    let Some(mut person) = session.load::<Person>(id).await? else {
        println!("no person {id}");
        return Ok(());
    };
    println!("editing {} ({})", person.name, person.age);
    person.name = input("name (text)> ");
    person.age = input("age (int)> ");
    session.save(&mut person).await?;
    println!("ok");
    Ok(())
}

fn print_people(people: &[Person]) {
    println!("{}", "-".repeat(50));
    for person in people {
        let id = person.id.map(|id| id.to_string()).unwrap_or_default();
        println!("{id:<6} | {:<20} | {:<4}", person.name, person.age);
    }
    println!("{}", "-".repeat(50));
}

struct Person {
    id: Option<NodeId>,
    name: String,
    age: i64,
}

impl Entity for Person {
    fn label() -> &'static str {
        "Person"
    }

    fn id(&self) -> Option<NodeId> {
        self.id
    }

    fn set_id(&mut self, id: NodeId) {
        self.id = Some(id);
    }

    fn to_properties(&self) -> Properties {
        Properties::from([
            ("name".into(), Value::from(self.name.as_str())),
            ("age".into(), Value::from(self.age)),
        ])
    }

    fn from_node(node: &Node) -> OgmResult<Person> {
        Ok(Person {
            id: Some(node.id),
            name: node.property("name")?,
            age: node.property("age")?,
        })
    }
}

/// Sets up tracing subscriber.
fn setup_tracing() {
    use tracing_subscriber::{
        fmt::{format::FmtSpan, layer},
        layer::SubscriberExt,
        util::SubscriberInitExt,
        EnvFilter,
    };

    let filter_layer = EnvFilter::try_from_default_env().unwrap_or("warn".into());
    let fmt_layer = layer().with_span_events(FmtSpan::NEW | FmtSpan::CLOSE);

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .init();
}

/// Gets a value from the stdin. Exits on end of input.
fn input<T: FromStr>(prompt: &str) -> T {
    let mut buf = String::new();
    loop {
        print!("{prompt}");
        let _ = io::stdout().flush();
        buf.clear();
        if io::stdin().read_line(&mut buf).unwrap_or(0) == 0 {
            println!("\nbye");
            std::process::exit(0);
        }
        match T::from_str(buf.trim()) {
            Ok(val) => break val,
            Err(_) => println!("try again."),
        }
    }
}
