//! End-to-end tests against a live PostgreSQL.
//!
//! Skipped unless `DATABASE_URL` is set (a `.env` file is honored). Every
//! test rolls its transaction back, so only `KeyBlocks` rows persist.

use futures_util::TryStreamExt;
use pgdoc::keygen::{KEY_BLOCKS_DDL, KeyAllocator, PgBlockSource};
use pgdoc::prelude::*;
use pgdoc::{CountStrategy, DocumentStoreBuilder, RetryManager};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Document)]
#[serde(rename_all = "camelCase")]
#[doc_map(table = "E2ePeople")]
struct Person {
    id: i64,
    #[doc_map(indexed, max_length = 100)]
    first_name: String,
    #[doc_map(indexed, max_length = 100)]
    last_name: String,
    nickname: Option<String>,
}

impl Person {
    fn new(first_name: &str, last_name: &str) -> Self {
        Self {
            id: 0,
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            nickname: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Document)]
#[doc_map(table = "E2eAccounts")]
#[doc_map(unique(
    name = "UX_E2eAccounts_Email",
    columns("Email"),
    message = "That email is already registered"
))]
struct Account {
    id: i64,
    #[doc_map(indexed)]
    email: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Document)]
#[doc_map(table = "E2eAnimals")]
struct Dog {
    id: i64,
    #[doc_map(indexed)]
    owner: String,
    breed: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Document)]
#[doc_map(table = "E2eAnimals")]
struct Cat {
    id: i64,
    #[doc_map(indexed)]
    owner: String,
    lives: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Document)]
#[serde(untagged)]
#[doc_map(discriminator = "Kind")]
enum Animal {
    #[doc_map(discriminator = "dog")]
    Dog(Dog),
    #[doc_map(discriminator = "cat")]
    Cat(Cat),
}

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS "E2ePeople" (
    "Id" bigint PRIMARY KEY,
    "FirstName" varchar(100) NOT NULL,
    "LastName" varchar(100) NOT NULL,
    "Document" jsonb NOT NULL
);
CREATE TABLE IF NOT EXISTS "E2eAccounts" (
    "Id" bigint PRIMARY KEY,
    "Email" text NOT NULL,
    "Document" jsonb NOT NULL,
    CONSTRAINT "UX_E2eAccounts_Email" UNIQUE ("Email")
);
CREATE TABLE IF NOT EXISTS "E2eAnimals" (
    "Id" bigint PRIMARY KEY,
    "Owner" text NOT NULL,
    "Kind" text NOT NULL,
    "Document" jsonb NOT NULL
);
"#;

fn database_url(test: &str) -> Option<String> {
    let _ = dotenvy::dotenv();
    match std::env::var("DATABASE_URL") {
        Ok(v) => Some(v),
        Err(_) => {
            eprintln!("DATABASE_URL is not set; skipping {test}");
            None
        }
    }
}

async fn setup(database_url: &str) -> DocResult<()> {
    let (client, connection) = tokio_postgres::connect(database_url, tokio_postgres::NoTls).await?;
    tokio::spawn(async move {
        let _ = connection.await;
    });
    // Tests run concurrently; serialize the DDL.
    let ddl = format!(
        "BEGIN; SELECT pg_advisory_xact_lock(7150001); {KEY_BLOCKS_DDL}; {SCHEMA} COMMIT;"
    );
    client.batch_execute(&ddl).await?;
    Ok(())
}

async fn store(test: &str, config: StoreConfig) -> DocResult<Option<DocumentStore>> {
    let Some(url) = database_url(test) else {
        return Ok(None);
    };
    setup(&url).await?;
    Ok(Some(DocumentStore::connect(&url, config)?))
}

fn marker() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

#[tokio::test]
async fn donald_duck_round_trip() -> DocResult<()> {
    let Some(store) = store("donald_duck_round_trip", StoreConfig::default()).await? else {
        return Ok(());
    };
    let tx = store.begin().await?;

    let mut duck = Person::new("Donald", "Duck");
    let id = tx.insert(&mut duck).await?;
    assert!(id > 0);
    assert_eq!(duck.id, id);

    let found = tx
        .query::<Person>()
        .filter(Person::FIRST_NAME.eq("Donald"))
        .filter(Person::ID.eq(id))
        .first_or_default(&tx)
        .await?;
    assert_eq!(found, Some(duck.clone()));

    let others = tx
        .query::<Person>()
        .filter(Person::FIRST_NAME.ne("Donald"))
        .to_list(&tx)
        .await?;
    assert!(others.iter().all(|p| p.id != id));

    let names = vec!["Duck", "Bunny"];
    let in_list = tx
        .query::<Person>()
        .filter(Person::LAST_NAME.is_in(names))
        .filter(Person::ID.eq(id))
        .to_list(&tx)
        .await?;
    assert_eq!(in_list, vec![duck.clone()]);

    let in_empty = tx
        .query::<Person>()
        .filter(Person::LAST_NAME.is_in(Vec::<String>::new()))
        .filter(Person::ID.eq(id))
        .to_list(&tx)
        .await?;
    assert!(in_empty.is_empty());

    tx.rollback().await
}

#[tokio::test]
async fn declared_unique_constraint_is_reported() -> DocResult<()> {
    let Some(store) = store("declared_unique_constraint_is_reported", StoreConfig::default()).await?
    else {
        return Ok(());
    };
    let tx = store.begin().await?;
    let email = format!("{}@example.com", marker());

    let mut first = Account {
        id: 0,
        email: email.clone(),
    };
    tx.insert(&mut first).await?;

    let mut second = Account { id: 0, email };
    let err = tx.insert(&mut second).await.unwrap_err();
    assert!(err.is_unique_violation(), "unexpected error: {err}");
    match err {
        DocError::UniqueConstraint {
            constraint,
            message,
        } => {
            assert_eq!(constraint, "UX_E2eAccounts_Email");
            assert_eq!(message, "That email is already registered");
        }
        other => panic!("unexpected error: {other}"),
    }
    // The failed insert aborted the transaction; dropping it rolls back.
    drop(tx);
    Ok(())
}

#[tokio::test]
async fn pagination_is_idempotent_under_both_count_strategies() -> DocResult<()> {
    for strategy in [CountStrategy::TwoRoundTrips, CountStrategy::SingleRoundTrip] {
        let config = StoreConfig::default().count_strategy(strategy);
        let Some(store) = store("pagination_is_idempotent", config).await? else {
            return Ok(());
        };
        let tx = store.begin().await?;
        let family = marker();
        for i in 0..7 {
            let mut person = Person::new(&format!("Duckling {i}"), &family);
            tx.insert(&mut person).await?;
        }

        let query = tx.query::<Person>().filter(Person::LAST_NAME.eq(family.clone()));
        let all = query.to_list(&tx).await?;
        assert_eq!(all.len(), 7);

        let mut paged = Vec::new();
        for skip in [0, 3, 6] {
            let page = query.to_list_page(&tx, skip, 3).await?;
            assert_eq!(page, query.to_list_page(&tx, skip, 3).await?);
            paged.extend(page);
        }
        assert_eq!(paged, all);

        let (page, total) = query.to_list_with_count(&tx, 3, 3).await?;
        assert_eq!(total, 7);
        assert_eq!(page, all[3..6].to_vec());

        let (past_end, total) = query.to_list_with_count(&tx, 10, 3).await?;
        assert!(past_end.is_empty());
        assert_eq!(total, 7);

        assert_eq!(query.count(&tx).await?, 7);
        assert!(query.any(&tx).await?);

        tx.rollback().await?;
    }
    Ok(())
}

#[tokio::test]
async fn load_update_and_delete_by_id() -> DocResult<()> {
    let Some(store) = store("load_update_and_delete_by_id", StoreConfig::default()).await? else {
        return Ok(());
    };
    let tx = store.begin().await?;

    let mut daisy = Person::new("Daisy", "Duck");
    let mut gladstone = Person::new("Gladstone", "Gander");
    tx.insert(&mut daisy).await?;
    tx.insert(&mut gladstone).await?;

    daisy.nickname = Some("Dais".to_string());
    tx.update(&daisy).await?;
    assert_eq!(tx.load_required::<Person>(daisy.id).await?, daisy);

    let missing = gladstone.id + 1_000_000;
    let loaded = tx
        .load_many::<Person>(&[gladstone.id, missing, daisy.id])
        .await?;
    assert_eq!(loaded.len(), 2);
    assert!(loaded[0].id < loaded[1].id);

    let err = tx
        .load_many_required::<Person>(&[daisy.id, missing])
        .await
        .unwrap_err();
    assert!(err.is_not_found());
    assert!(err.to_string().contains(&missing.to_string()));

    let mut clone = daisy.clone();
    let err = tx.insert_with_id(&mut clone, daisy.id + 1).await.unwrap_err();
    assert!(matches!(err, DocError::IdConflict { .. }));

    assert!(tx.delete_by_id::<Person>(gladstone.id).await?);
    assert!(!tx.delete_by_id::<Person>(gladstone.id).await?);
    assert_eq!(tx.load::<Person>(gladstone.id).await?, None);

    tx.rollback().await
}

#[tokio::test]
async fn stream_matches_to_list() -> DocResult<()> {
    let Some(store) = store("stream_matches_to_list", StoreConfig::default()).await? else {
        return Ok(());
    };
    let tx = store.begin().await?;
    let family = marker();
    for name in ["Huey", "Dewey", "Louie"] {
        tx.insert(&mut Person::new(name, &family)).await?;
    }

    let query = tx.query::<Person>().filter(Person::LAST_NAME.eq(family));
    let listed = query.to_list(&tx).await?;
    let streamed: Vec<Person> = query.stream(&tx).await?.try_collect().await?;
    assert_eq!(streamed, listed);
    assert_eq!(streamed.len(), 3);

    let removed = query.delete(&tx).await?;
    assert_eq!(removed, 3);
    assert!(!query.any(&tx).await?);

    tx.rollback().await
}

#[tokio::test]
async fn polymorphic_table_reads_back_each_variant() -> DocResult<()> {
    let Some(store) = store("polymorphic_table_reads_back_each_variant", StoreConfig::default()).await?
    else {
        return Ok(());
    };
    let tx = store.begin().await?;
    let owner = marker();

    let mut pets = vec![
        Animal::Dog(Dog {
            id: 0,
            owner: owner.clone(),
            breed: "Beagle".into(),
        }),
        Animal::Cat(Cat {
            id: 0,
            owner: owner.clone(),
            lives: 9,
        }),
        Animal::Dog(Dog {
            id: 0,
            owner: owner.clone(),
            breed: "Collie".into(),
        }),
    ];
    for pet in &mut pets {
        tx.insert(pet).await?;
    }

    let loaded = tx
        .query::<Animal>()
        .filter(Dog::OWNER.eq(owner.clone()))
        .to_list(&tx)
        .await?;
    assert_eq!(loaded, pets);

    let cats = tx
        .query::<Animal>()
        .filter(Dog::OWNER.eq(owner))
        .filter_sql("\"Kind\" = @kind")
        .parameter("kind", "cat")
        .to_list(&tx)
        .await?;
    assert_eq!(cats, vec![pets[1].clone()]);

    assert_eq!(tx.load_required::<Animal>(pets[2].id()).await?, pets[2]);

    tx.rollback().await
}

#[tokio::test]
async fn key_blocks_interleave_between_allocators() -> DocResult<()> {
    let Some(url) = database_url("key_blocks_interleave_between_allocators") else {
        return Ok(());
    };
    setup(&url).await?;
    let pool = pgdoc::create_pool(&url)?;
    let source = Arc::new(PgBlockSource::new(pool, RetryManager::default()));
    let a = KeyAllocator::new(source.clone(), 10);
    let b = KeyAllocator::new(source, 10);
    let table = format!("Keys_{}", marker());

    assert_eq!(a.next_id(&table).await?, 1);
    assert_eq!(b.next_id(&table).await?, 11);
    assert_eq!(a.next_id(&table).await?, 2);
    assert_eq!(b.next_id(&table).await?, 12);
    Ok(())
}

#[tokio::test]
async fn transaction_macro_commits_and_rolls_back() -> DocResult<()> {
    let Some(url) = database_url("transaction_macro_commits_and_rolls_back") else {
        return Ok(());
    };
    setup(&url).await?;
    let store = DocumentStoreBuilder::new(StoreConfig::default())
        .pool(pgdoc::create_pool(&url)?)
        .build()?;

    let family = marker();
    let result: DocResult<i64> = async {
        pgdoc::transaction!(store, tx, {
            tx.insert(&mut Person::new("Scrooge", &family)).await?;
            Err(DocError::validation("abort"))
        })
    }
    .await;
    assert!(matches!(result, Err(DocError::Validation(_))));

    let tx = store.begin().await?;
    let count = tx
        .query::<Person>()
        .filter(Person::LAST_NAME.eq(family))
        .count(&tx)
        .await?;
    assert_eq!(count, 0);
    tx.rollback().await?;
    assert_eq!(store.transactions().len(), 0);
    Ok(())
}

#[test]
fn blocking_store_matches_async_results() -> DocResult<()> {
    let Some(url) = database_url("blocking_store_matches_async_results") else {
        return Ok(());
    };
    tokio::runtime::Runtime::new()
        .map_err(|e| DocError::Other(e.to_string()))?
        .block_on(setup(&url))?;
    let store = pgdoc::BlockingStore::connect(&url, StoreConfig::default())?;
    let tx = store.begin()?;
    let family = marker();
    let mut duck = Person::new("Fethry", &family);
    tx.insert(&mut duck)?;

    let query = tx.query::<Person>().filter(Person::LAST_NAME.eq(family));
    assert_eq!(tx.to_list(&query)?, vec![duck.clone()]);
    assert_eq!(tx.count(&query)?, 1);
    assert_eq!(tx.load::<Person>(duck.id)?, Some(duck));
    tx.rollback()
}
