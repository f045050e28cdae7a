use std::collections::HashSet;
use std::sync::Arc;

use social_core::error::AppError;
use social_core::models::{PrivacyLevel, Profile};
use social_core::services::{ContentService, GraphService};
use social_core::store::{ContentStore, MemoryStore, SocialGraphStore};
use social_core::{Config, DomainEvent, EventBus, ModerationFilter, VisibilityEngine};
use uuid::Uuid;

struct World {
    store: Arc<MemoryStore>,
    graph: GraphService<MemoryStore>,
    content: ContentService<MemoryStore>,
    engine: VisibilityEngine<MemoryStore>,
    events: EventBus,
}

async fn setup() -> World {
    let store = Arc::new(MemoryStore::new());
    let events = EventBus::new(64);
    World {
        graph: GraphService::new(store.clone(), events.clone()),
        content: ContentService::new(
            store.clone(),
            ModerationFilter::new(),
            events.clone(),
            &Config::test_defaults(),
        ),
        engine: VisibilityEngine::new(store.clone()),
        store,
        events,
    }
}

async fn user(store: &MemoryStore, name: &str, private: bool) -> Uuid {
    let profile = if private {
        Profile::private(name)
    } else {
        Profile::new(name)
    };
    let id = profile.id;
    store.insert_profile(profile).await.unwrap();
    id
}

#[tokio::test]
async fn follow_maintains_counters_and_is_idempotent() {
    let world = setup().await;
    let alice = user(&world.store, "alice", false).await;
    let bob = user(&world.store, "bob", false).await;
    let mut rx = world.events.subscribe();

    world.graph.follow(alice, bob).await.unwrap();
    world.graph.follow(alice, bob).await.unwrap(); // no-op

    let bob_profile = world.store.get_profile(bob).await.unwrap().unwrap();
    let alice_profile = world.store.get_profile(alice).await.unwrap().unwrap();
    assert_eq!(bob_profile.followers_count, 1);
    assert_eq!(alice_profile.following_count, 1);

    // Exactly one Followed event for the two calls.
    assert!(matches!(rx.recv().await.unwrap(), DomainEvent::Followed { .. }));
    assert!(rx.try_recv().is_err());

    world.graph.unfollow(alice, bob).await.unwrap();
    world.graph.unfollow(alice, bob).await.unwrap(); // no-op
    let bob_profile = world.store.get_profile(bob).await.unwrap().unwrap();
    assert_eq!(bob_profile.followers_count, 0);
}

#[tokio::test]
async fn self_edges_are_rejected() {
    let world = setup().await;
    let alice = user(&world.store, "alice", false).await;

    assert!(matches!(
        world.graph.follow(alice, alice).await.unwrap_err(),
        AppError::Validation(_)
    ));
    assert!(matches!(
        world.graph.block(alice, alice).await.unwrap_err(),
        AppError::Validation(_)
    ));
}

#[tokio::test]
async fn blocking_severs_follows_and_gates_new_ones() {
    let world = setup().await;
    let alice = user(&world.store, "alice", false).await;
    let bob = user(&world.store, "bob", false).await;
    world.graph.follow(alice, bob).await.unwrap();
    world.graph.follow(bob, alice).await.unwrap();

    world.graph.block(alice, bob).await.unwrap();

    assert!(!world.store.is_following(alice, bob).await.unwrap());
    assert!(!world.store.is_following(bob, alice).await.unwrap());
    let alice_profile = world.store.get_profile(alice).await.unwrap().unwrap();
    assert_eq!(alice_profile.followers_count, 0);
    assert_eq!(alice_profile.following_count, 0);

    // Neither side can follow across the block.
    assert!(matches!(
        world.graph.follow(bob, alice).await.unwrap_err(),
        AppError::Forbidden { .. }
    ));
    assert!(matches!(
        world.graph.follow(alice, bob).await.unwrap_err(),
        AppError::Forbidden { .. }
    ));
}

#[tokio::test]
async fn only_the_blocker_can_unblock() {
    let world = setup().await;
    let alice = user(&world.store, "alice", false).await;
    let bob = user(&world.store, "bob", false).await;
    world.graph.block(alice, bob).await.unwrap();

    // Bob holds no edge in his direction; his unblock changes nothing.
    world.graph.unblock(bob, alice).await.unwrap();
    assert!(world.store.has_block_between(alice, bob).await.unwrap());

    world.graph.unblock(alice, bob).await.unwrap();
    assert!(!world.store.has_block_between(alice, bob).await.unwrap());
    world.graph.follow(bob, alice).await.unwrap();
}

#[tokio::test]
async fn post_ingestion_validates_moderates_and_counts() {
    let world = setup().await;
    let alice = user(&world.store, "alice", false).await;

    let post = world
        .content
        .create_post(alice, "first post", PrivacyLevel::Public, HashSet::new())
        .await
        .unwrap();
    assert_eq!(post.author_id, alice);
    let profile = world.store.get_profile(alice).await.unwrap().unwrap();
    assert_eq!(profile.posts_count, 1);

    assert!(matches!(
        world
            .content
            .create_post(alice, "   ", PrivacyLevel::Public, HashSet::new())
            .await
            .unwrap_err(),
        AppError::Validation(_)
    ));
    assert!(matches!(
        world
            .content
            .create_post(alice, "what the f**k", PrivacyLevel::Public, HashSet::new())
            .await
            .unwrap_err(),
        AppError::ContentBlocked { .. }
    ));

    // A private post must name an audience, and the author does not count.
    assert!(matches!(
        world
            .content
            .create_post(alice, "secret", PrivacyLevel::Private, HashSet::new())
            .await
            .unwrap_err(),
        AppError::Validation(_)
    ));
    assert!(matches!(
        world
            .content
            .create_post(
                alice,
                "secret",
                PrivacyLevel::Private,
                HashSet::from([alice])
            )
            .await
            .unwrap_err(),
        AppError::Validation(_)
    ));
    let bob = user(&world.store, "bob", false).await;
    let post = world
        .content
        .create_post(
            alice,
            "secret",
            PrivacyLevel::Private,
            HashSet::from([alice, bob]),
        )
        .await
        .unwrap();
    assert_eq!(post.allowed_users, HashSet::from([bob]));
}

#[tokio::test]
async fn deleting_a_post_is_owner_only_and_decrements_the_counter() {
    let world = setup().await;
    let alice = user(&world.store, "alice", false).await;
    let bob = user(&world.store, "bob", false).await;
    let post = world
        .content
        .create_post(alice, "mine", PrivacyLevel::Public, HashSet::new())
        .await
        .unwrap();

    assert!(matches!(
        world.content.delete_post(post.id, bob).await.unwrap_err(),
        AppError::Forbidden { .. }
    ));
    world.content.delete_post(post.id, alice).await.unwrap();
    assert!(matches!(
        world.content.delete_post(post.id, alice).await.unwrap_err(),
        AppError::NotFound { .. }
    ));
    let profile = world.store.get_profile(alice).await.unwrap().unwrap();
    assert_eq!(profile.posts_count, 0);
}

#[tokio::test]
async fn feed_scenario_from_ingestion_to_visibility() {
    let world = setup().await;
    let x = user(&world.store, "x", false).await;
    let y = user(&world.store, "y", false).await;
    let recluse = user(&world.store, "recluse", true).await;

    let gated = world
        .content
        .create_post(x, "followers only", PrivacyLevel::Followers, HashSet::new())
        .await
        .unwrap();
    let walled = world
        .content
        .create_post(recluse, "public on paper", PrivacyLevel::Public, HashSet::new())
        .await
        .unwrap();

    let feed = vec![gated.clone(), walled.clone()];

    // Y follows no one yet: nothing is visible.
    let visible = world
        .engine
        .filter_visible(Some(y), feed.clone())
        .await
        .unwrap();
    assert!(visible.is_empty());

    // Following X reveals the followers-only post but not the private
    // author's.
    world.graph.follow(y, x).await.unwrap();
    let visible = world
        .engine
        .filter_visible(Some(y), feed.clone())
        .await
        .unwrap();
    let ids: Vec<Uuid> = visible.iter().map(|p| p.id).collect();
    assert_eq!(ids, vec![gated.id]);

    // A block from X takes it away again.
    world.graph.block(x, y).await.unwrap();
    let visible = world.engine.filter_visible(Some(y), feed).await.unwrap();
    assert!(visible.is_empty());
}
