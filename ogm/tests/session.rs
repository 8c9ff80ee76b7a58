use std::sync::Arc;

use ogm::{
    driver::memory::InMemoryDriver,
    error::OgmResult,
    model::{NodeId, Properties, Value},
};

mod test_utils;
use test_utils::Person;

fn setup() -> (Arc<InMemoryDriver>, ogm::SessionFactory) {
    test_utils::setup_tracing(None);
    let driver = Arc::new(InMemoryDriver::new(4));
    let factory = test_utils::factory_with(driver.clone(), 2);
    (driver, factory)
}

#[tokio::test]
async fn test_save_and_load() -> OgmResult<()> {
    let (_, factory) = setup();
    let mut session = factory.open_session();

    let mut ada = Person::new("Ada", 36);
    session.save(&mut ada).await?;
    let id = ada.id.expect("saved entities have an id");

    let mut other = factory.open_session();
    let loaded = other.load::<Person>(id).await?;
    assert_eq!(loaded, Some(ada));
    assert!(other.load::<Person>(NodeId::new(999)).await?.is_none());
    Ok(())
}

#[tokio::test]
async fn test_identity_map() -> OgmResult<()> {
    let (_, factory) = setup();
    let mut session = factory.open_session();

    let mut ada = Person::new("Ada", 36);
    session.save(&mut ada).await?;
    let id = ada.id.unwrap();

    // GIVEN the same node loaded twice
    let first = session.load::<Person>(id).await?.unwrap();
    let second = session.load::<Person>(id).await?.unwrap();

    // THEN both share one identity, and the context has a single snapshot
    assert_eq!(first.id, second.id);
    assert_eq!(session.context().len(), 1);

    // WHEN another session updates the node, a reload refreshes the snapshot
    let mut other = factory.open_session();
    let mut older = other.load::<Person>(id).await?.unwrap();
    older.age = 37;
    other.save(&mut older).await?;

    let refreshed = session.load::<Person>(id).await?.unwrap();
    assert_eq!(refreshed.age, 37);
    assert_eq!(session.context().len(), 1);
    let snapshot = session.context().get(id).unwrap();
    assert_eq!(snapshot.property::<i64>("age")?, 37);

    assert!(session.evict(id));
    assert!(session.context().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_unchanged_entity_is_not_sent() -> OgmResult<()> {
    let (driver, factory) = setup();
    let mut session = factory.open_session();

    let mut ada = Person::new("Ada", 36);
    session.save(&mut ada).await?;
    let id = ada.id.unwrap();

    // Changed behind the session's back; the session's snapshot is stale.
    let mut other = factory.open_session();
    let mut changed = other.load::<Person>(id).await?.unwrap();
    changed.name = "Augusta".into();
    other.save(&mut changed).await?;

    session.save(&mut ada).await?;
    let name = driver.committed(id).unwrap().property::<String>("name")?;
    assert_eq!(name, "Augusta");

    // Once dirty, the entity is written.
    ada.age = 37;
    session.save(&mut ada).await?;
    let stored = driver.committed(id).unwrap();
    assert_eq!(stored.property::<String>("name")?, "Ada");
    assert_eq!(stored.property::<i64>("age")?, 37);
    Ok(())
}

#[tokio::test]
async fn test_load_by_and_delete() -> OgmResult<()> {
    let (driver, factory) = setup();
    let mut session = factory.open_session();

    let mut people = vec![
        Person::new("Ada", 36),
        Person::new("Alan", 41),
        Person::new("Grace", 36),
        Person::new("Edsger", 72),
    ];
    session.begin_transaction().await?;
    for person in &mut people {
        session.save(person).await?;
    }
    session.commit().await?;

    // More rows than the fetch size.
    let all = session.load_all::<Person>().await?;
    assert_eq!(all, people);

    let filter = Properties::from([("age".into(), Value::Int(36))]);
    let names: Vec<_> = session
        .load_by::<Person>(filter)
        .await?
        .into_iter()
        .map(|person| person.name)
        .collect();
    assert_eq!(names, ["Ada", "Grace"]);

    assert!(session.delete(&people[1]).await?);
    assert!(!session.delete(&people[1]).await?);
    assert!(!session.delete(&Person::new("Nobody", 0)).await?);
    assert_eq!(session.count::<Person>().await?, 3);
    assert_eq!(driver.committed_len(), 3);
    assert!(!session.context().contains(people[1].id.unwrap()));
    Ok(())
}

#[tokio::test]
async fn test_update_of_deleted_entity() -> OgmResult<()> {
    let (_, factory) = setup();
    let mut session = factory.open_session();

    let mut ada = Person::new("Ada", 36);
    session.save(&mut ada).await?;
    assert!(session.delete(&ada).await?);

    ada.age = 37;
    assert!(session.save(&mut ada).await.unwrap_err().is_illegal_state());
    Ok(())
}

#[tokio::test]
async fn test_close_releases_everything() -> OgmResult<()> {
    let (driver, factory) = setup();
    let mut session = factory.open_session();

    session.begin_transaction().await?;
    session.save(&mut Person::new("Ada", 36)).await?;
    assert_eq!(driver.available_connections(), 3);

    session.close().await;
    assert_eq!(driver.available_connections(), 4);
    assert_eq!(driver.committed_len(), 0);
    assert!(session.context().is_empty());

    session.close().await;
    let err = session.load_all::<Person>().await.unwrap_err();
    assert!(err.is_illegal_state());
    Ok(())
}

#[tokio::test]
async fn test_sessions_share_the_pool() -> OgmResult<()> {
    let driver = Arc::new(InMemoryDriver::new(2));
    let factory = test_utils::factory_with(driver.clone(), 10);

    let mut sessions: Vec<_> = (0..2).map(|_| factory.open_session()).collect();
    for session in &mut sessions {
        session.begin_transaction().await?;
    }
    assert_eq!(driver.available_connections(), 0);

    let handle = tokio::spawn({
        let mut waiting = factory.open_session();
        async move {
            waiting.begin_transaction().await?;
            waiting.commit().await
        }
    });
    tokio::task::yield_now().await;
    assert!(!handle.is_finished());

    sessions[0].commit().await?;
    handle.await.expect("task panicked")?;
    sessions[1].rollback().await?;
    assert_eq!(driver.available_connections(), 2);
    Ok(())
}
