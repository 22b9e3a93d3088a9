use std::collections::HashSet;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use plaza_core::{FilterMode, Post, PostDraft, PostId, Timestamp, UserId};
use plaza_util_error::BoxedErrorResult;

use crate::testing::{post_at, titles, wait_for_items, MemFollows, MemRepo};
use crate::{FeedConfig, FeedEngine, FeedError, ForYouStrategy, LiveMergePolicy};

struct Fixture {
    repo: Arc<MemRepo>,
    follows: Arc<MemFollows>,
    viewer: UserId,
    other: UserId,
}

impl Fixture {
    fn new() -> Self {
        Self {
            repo: Arc::new(MemRepo::new()),
            follows: Arc::new(MemFollows::default()),
            viewer: UserId::random(),
            other: UserId::random(),
        }
    }

    fn engine(&self, page_size: usize) -> FeedEngine {
        self.engine_with(config(page_size, LiveMergePolicy::Unconditional))
    }

    fn engine_with(&self, config: FeedConfig) -> FeedEngine {
        FeedEngine::builder()
            .repo(self.repo.clone())
            .follows(self.follows.clone())
            .config(config)
            .build()
    }

    /// Seed `n` posts of `other`, titled by their timestamp `0..n`
    fn seed_numbered(&self, n: u64) {
        for i in 0..n {
            self.repo.seed(post_at(self.other, &i.to_string(), i));
        }
    }
}

fn config(page_size: usize, live_merge: LiveMergePolicy) -> FeedConfig {
    FeedConfig::builder()
        .page_size(NonZeroUsize::new(page_size).expect("non-zero"))
        .live_merge(live_merge)
        .build()
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn pagination_terminates() -> BoxedErrorResult<()> {
    let fx = Fixture::new();
    fx.seed_numbered(7);

    let view = fx.engine(3).open_view(fx.viewer, FilterMode::All).await?;
    assert_eq!(titles(&view.items()), ["6", "5", "4"]);
    assert!(view.has_more());

    assert_eq!(view.load_more().await?, 3);
    assert!(view.has_more());
    assert_eq!(view.load_more().await?, 1);
    assert!(!view.has_more());
    assert_eq!(view.cursor().offset(), 6);

    let calls = fx.repo.fetch_calls();
    assert_eq!(view.load_more().await?, 0);
    assert_eq!(fx.repo.fetch_calls(), calls);

    assert_eq!(
        titles(&view.items()),
        ["6", "5", "4", "3", "2", "1", "0"]
    );
    Ok(())
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn pagination_at_exact_page_multiple_costs_one_empty_fetch() -> BoxedErrorResult<()> {
    let fx = Fixture::new();
    fx.seed_numbered(6);

    let view = fx.engine(3).open_view(fx.viewer, FilterMode::All).await?;
    assert_eq!(view.load_more().await?, 3);
    assert!(view.has_more());

    assert_eq!(view.load_more().await?, 0);
    assert!(!view.has_more());
    assert_eq!(view.items().len(), 6);
    assert_eq!(fx.repo.fetch_calls(), 3);
    Ok(())
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn subscribed_following_nobody_does_not_query() -> BoxedErrorResult<()> {
    let fx = Fixture::new();
    fx.seed_numbered(3);

    let view = fx
        .engine(3)
        .open_view(fx.viewer, FilterMode::Subscribed)
        .await?;
    assert!(view.items().is_empty());
    assert!(!view.has_more());
    assert_eq!(view.load_more().await?, 0);
    assert_eq!(fx.repo.fetch_calls(), 0);
    Ok(())
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn subscribed_and_all() -> BoxedErrorResult<()> {
    let fx = Fixture::new();
    let followed = UserId::random();
    fx.follows.follow(fx.viewer, followed);
    fx.repo.seed(post_at(followed, "1", 1));
    fx.repo.seed(post_at(fx.other, "2", 2));

    let view = fx
        .engine(10)
        .open_view(fx.viewer, FilterMode::Subscribed)
        .await?;
    assert_eq!(titles(&view.items()), ["1"]);

    view.switch_mode(FilterMode::All).await?;
    assert_eq!(view.mode(), FilterMode::All);
    assert_eq!(titles(&view.items()), ["2", "1"]);

    view.switch_mode(FilterMode::Creator(fx.other)).await?;
    assert_eq!(titles(&view.items()), ["2"]);
    Ok(())
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn live_posts_go_on_top() -> BoxedErrorResult<()> {
    let fx = Fixture::new();
    fx.repo.seed(post_at(fx.other, "p1", 20));
    fx.repo.seed(post_at(fx.other, "p2", 10));

    let view = fx.engine(10).open_view(fx.viewer, FilterMode::All).await?;
    assert_eq!(titles(&view.items()), ["p1", "p2"]);

    // older than everything on the page, still goes on top
    fx.repo.publish(post_at(fx.other, "p3", 5));
    wait_for_items(&view, |items| items.len() == 3).await;
    assert_eq!(titles(&view.items()), ["p3", "p1", "p2"]);
    Ok(())
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn live_duplicate_replaces_in_place() -> BoxedErrorResult<()> {
    let fx = Fixture::new();
    let p1 = fx.repo.seed(post_at(fx.other, "p1", 20));
    fx.repo.seed(post_at(fx.other, "p2", 10));

    let view = fx.engine(10).open_view(fx.viewer, FilterMode::All).await?;

    fx.repo.announce(Post {
        title: "p1 edited".into(),
        ..p1
    });
    wait_for_items(&view, |items| items[0].post.title == "p1 edited").await;
    assert_eq!(titles(&view.items()), ["p1 edited", "p2"]);
    Ok(())
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn live_drafts_are_dropped() -> BoxedErrorResult<()> {
    let fx = Fixture::new();
    let view = fx.engine(10).open_view(fx.viewer, FilterMode::All).await?;

    fx.repo.announce(
        PostDraft::new(fx.other, "draft")
            .publish(false)
            .into_post(PostId::random(), Timestamp(1)),
    );
    fx.repo.publish(post_at(fx.other, "published", 2));

    wait_for_items(&view, |items| !items.is_empty()).await;
    assert_eq!(titles(&view.items()), ["published"]);
    Ok(())
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn live_match_filter_policy() -> BoxedErrorResult<()> {
    let fx = Fixture::new();
    let followed = UserId::random();
    fx.follows.follow(fx.viewer, followed);
    let engine = fx.engine_with(config(10, LiveMergePolicy::MatchFilter));

    let subscribed = engine
        .open_view(fx.viewer, FilterMode::Subscribed)
        .await?;
    let by_other = engine
        .open_view(fx.viewer, FilterMode::Creator(fx.other))
        .await?;

    fx.repo.publish(post_at(fx.other, "not followed", 1));
    fx.repo.publish(post_at(followed, "followed", 2));

    wait_for_items(&subscribed, |items| !items.is_empty()).await;
    assert_eq!(titles(&subscribed.items()), ["followed"]);

    wait_for_items(&by_other, |items| !items.is_empty()).await;
    assert_eq!(titles(&by_other.items()), ["not followed"]);
    Ok(())
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn optimistic_delete() -> BoxedErrorResult<()> {
    let fx = Fixture::new();
    for (title, ts) in [("p1", 3), ("p2", 2), ("p3", 1)] {
        fx.repo.seed(post_at(fx.viewer, title, ts));
    }
    let view = fx.engine(10).open_view(fx.viewer, FilterMode::All).await?;
    let ids: Vec<_> = view.items().into_iter().map(|i| i.post.id).collect();
    assert!(view.items().iter().all(|i| i.owned));

    view.delete(ids[1]).await?;
    assert_eq!(titles(&view.items()), ["p1", "p3"]);

    fx.repo.fail_delete.store(true, Ordering::SeqCst);
    let res = view.delete(ids[2]).await;
    assert!(matches!(res, Err(FeedError::DeleteFailed { post_id, .. }) if post_id == ids[2]));
    // not put back
    assert_eq!(titles(&view.items()), ["p1"]);
    Ok(())
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn delete_requires_ownership() -> BoxedErrorResult<()> {
    let fx = Fixture::new();
    let theirs = fx.repo.seed(post_at(fx.other, "theirs", 3));
    let theirs_hidden = fx.repo.seed(post_at(fx.other, "theirs, not loaded", 1));
    let mine_hidden = fx.repo.seed(post_at(fx.viewer, "mine, not loaded", 2));

    let view = fx.engine(1).open_view(fx.viewer, FilterMode::All).await?;
    assert_eq!(titles(&view.items()), ["theirs"]);
    assert!(!view.items()[0].owned);

    assert!(matches!(
        view.delete(theirs.id).await,
        Err(FeedError::NotOwner { .. })
    ));
    assert_eq!(titles(&view.items()), ["theirs"]);

    assert!(matches!(
        view.delete(theirs_hidden.id).await,
        Err(FeedError::NotOwner { .. })
    ));

    view.delete(mine_hidden.id).await?;
    assert!(matches!(
        view.delete(mine_hidden.id).await,
        Err(FeedError::DeleteFailed { .. })
    ));
    Ok(())
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn local_insert_and_remove_are_idempotent() -> BoxedErrorResult<()> {
    let fx = Fixture::new();
    fx.repo.seed(post_at(fx.other, "p1", 1));
    let view = fx.engine(10).open_view(fx.viewer, FilterMode::All).await?;

    let mine = post_at(fx.viewer, "mine", 0);
    assert!(view.insert_local(mine.clone()));
    assert!(!view.insert_local(mine.clone()));
    assert_eq!(titles(&view.items()), ["mine", "p1"]);
    assert!(view.items()[0].owned);

    assert!(view.remove_local(mine.id));
    assert!(!view.remove_local(mine.id));
    assert_eq!(titles(&view.items()), ["p1"]);
    Ok(())
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn unchanged_content_does_not_notify() -> BoxedErrorResult<()> {
    let fx = Fixture::new();
    let p1 = fx.repo.seed(post_at(fx.other, "p1", 1));
    let view = fx.engine(10).open_view(fx.viewer, FilterMode::All).await?;
    let mut changes = view.subscribe_changes();

    // same id, same content
    assert!(!view.insert_local(p1.clone()));
    assert!(!changes.has_changed()?);

    assert!(!view.insert_local(Post {
        title: "p1 edited".into(),
        ..p1.clone()
    }));
    assert!(changes.has_changed()?);
    changes.borrow_and_update();

    assert!(!view.remove_local(PostId::random()));
    assert!(!changes.has_changed()?);

    view.close();
    changes.borrow_and_update();
    assert!(!view.insert_local(post_at(fx.viewer, "mine", 2)));
    assert!(!view.remove_local(p1.id));
    assert!(!changes.has_changed()?);
    assert_eq!(titles(&view.items()), ["p1 edited"]);
    Ok(())
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn refresh_replaces_only_on_success() -> BoxedErrorResult<()> {
    let fx = Fixture::new();
    fx.seed_numbered(2);
    let view = fx.engine(10).open_view(fx.viewer, FilterMode::All).await?;
    let mut changes = view.subscribe_changes();

    fx.repo.seed(post_at(fx.other, "new", 10));
    view.refresh().await?;
    assert_eq!(titles(&view.items()), ["new", "1", "0"]);
    assert!(changes.has_changed()?);
    changes.borrow_and_update();

    fx.repo.fail_fetch.store(true, Ordering::SeqCst);
    fx.repo.seed(post_at(fx.other, "newer", 11));
    assert!(matches!(
        view.refresh().await,
        Err(FeedError::Repository { .. })
    ));
    assert!(matches!(
        view.switch_mode(FilterMode::Creator(fx.viewer)).await,
        Err(FeedError::Repository { .. })
    ));
    assert_eq!(titles(&view.items()), ["new", "1", "0"]);
    assert_eq!(view.mode(), FilterMode::All);
    assert!(!changes.has_changed()?);
    Ok(())
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn failed_load_more_can_be_retried() -> BoxedErrorResult<()> {
    let fx = Fixture::new();
    fx.seed_numbered(4);
    let view = fx.engine(2).open_view(fx.viewer, FilterMode::All).await?;

    fx.repo.fail_fetch.store(true, Ordering::SeqCst);
    assert!(view.load_more().await.is_err());
    assert_eq!(view.cursor().offset(), 0);

    fx.repo.fail_fetch.store(false, Ordering::SeqCst);
    assert_eq!(view.load_more().await?, 2);
    assert_eq!(titles(&view.items()), ["3", "2", "1", "0"]);
    Ok(())
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn load_more_is_not_reentrant() -> BoxedErrorResult<()> {
    let fx = Fixture::new();
    fx.seed_numbered(7);
    let view = fx.engine(3).open_view(fx.viewer, FilterMode::All).await?;

    fx.repo.close_gate();
    let loading = tokio::spawn({
        let view = view.clone();
        async move { view.load_more().await }
    });
    fx.repo.wait_fetch_calls(2).await;

    assert!(matches!(
        view.load_more().await,
        Err(FeedError::LoadInProgress)
    ));

    fx.repo.open_gate();
    assert_eq!(loading.await??, 3);
    assert_eq!(fx.repo.fetch_calls(), 2);

    assert_eq!(view.load_more().await?, 1);
    Ok(())
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn live_merges_while_page_load_is_blocked() -> BoxedErrorResult<()> {
    let fx = Fixture::new();
    fx.seed_numbered(7);
    let view = fx.engine(3).open_view(fx.viewer, FilterMode::All).await?;

    fx.repo.close_gate();
    let loading = tokio::spawn({
        let view = view.clone();
        async move { view.load_more().await }
    });
    fx.repo.wait_fetch_calls(2).await;

    let live = fx.repo.publish(post_at(fx.other, "live", 100));
    wait_for_items(&view, |items| items.len() == 4).await;
    assert_eq!(view.items()[0].post.id, live.id);

    fx.repo.open_gate();
    assert_eq!(loading.await??, 3);

    let items = view.items();
    assert_eq!(titles(&items), ["live", "6", "5", "4", "3", "2", "1"]);
    let unique: HashSet<_> = items.iter().map(|i| i.post.id).collect();
    assert_eq!(unique.len(), items.len());
    Ok(())
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn close_discards_late_results_and_stops_live() -> BoxedErrorResult<()> {
    let fx = Fixture::new();
    fx.seed_numbered(7);
    let view = fx.engine(3).open_view(fx.viewer, FilterMode::All).await?;
    assert_eq!(fx.repo.live_subscribers(), 1);

    fx.repo.close_gate();
    let loading = tokio::spawn({
        let view = view.clone();
        async move { view.load_more().await }
    });
    fx.repo.wait_fetch_calls(2).await;

    view.close();
    fx.repo.open_gate();
    assert!(matches!(loading.await?, Err(FeedError::Closed)));
    assert_eq!(titles(&view.items()), ["6", "5", "4"]);
    assert!(view.is_closed());
    assert!(matches!(view.load_more().await, Err(FeedError::Closed)));

    wait_for_no_subscribers(&fx.repo).await;
    fx.repo.publish(post_at(fx.other, "too late", 100));
    assert_eq!(view.items().len(), 3);
    Ok(())
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn dropping_view_stops_live() -> BoxedErrorResult<()> {
    let fx = Fixture::new();
    let view = fx.engine(3).open_view(fx.viewer, FilterMode::All).await?;
    assert_eq!(fx.repo.live_subscribers(), 1);

    drop(view);
    wait_for_no_subscribers(&fx.repo).await;
    Ok(())
}

async fn wait_for_no_subscribers(repo: &MemRepo) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while repo.live_subscribers() != 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("Live task still running");
}

/// Keeps every other candidate, returned in reverse
struct EveryOther;

impl ForYouStrategy for EveryOther {
    fn select(&self, candidates: &[Post]) -> Vec<Post> {
        candidates.iter().step_by(2).rev().cloned().collect()
    }
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn for_you_keeps_candidate_order() -> BoxedErrorResult<()> {
    let fx = Fixture::new();
    fx.seed_numbered(6);
    let engine = FeedEngine::builder()
        .repo(fx.repo.clone())
        .follows(fx.follows.clone())
        .for_you(Arc::new(EveryOther))
        .config(config(4, LiveMergePolicy::Unconditional))
        .build();

    let view = engine.open_view(fx.viewer, FilterMode::ForYou).await?;
    assert_eq!(titles(&view.items()), ["5", "3"]);
    // based on the raw candidate count
    assert!(view.has_more());

    assert_eq!(view.load_more().await?, 1);
    assert_eq!(titles(&view.items()), ["5", "3", "1"]);
    assert!(!view.has_more());
    Ok(())
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn load_more_during_reload_does_nothing() -> BoxedErrorResult<()> {
    let fx = Fixture::new();
    let followed = UserId::random();
    fx.follows.follow(fx.viewer, followed);
    fx.seed_numbered(9);
    fx.repo.seed(post_at(followed, "followed", 100));

    let view = fx.engine(3).open_view(fx.viewer, FilterMode::All).await?;
    assert_eq!(titles(&view.items()), ["followed", "8", "7"]);

    fx.repo.close_gate();
    let switching = tokio::spawn({
        let view = view.clone();
        async move { view.switch_mode(FilterMode::Subscribed).await }
    });
    fx.repo.wait_fetch_calls(2).await;

    assert_eq!(view.load_more().await?, 0);
    assert_eq!(fx.repo.fetch_calls(), 2);

    fx.repo.open_gate();
    switching.await??;

    assert_eq!(view.mode(), FilterMode::Subscribed);
    assert_eq!(titles(&view.items()), ["followed"]);
    assert_eq!(view.cursor().offset(), 0);
    assert!(!view.has_more());
    Ok(())
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn live_posts_during_mode_switch_follow_the_new_mode() -> BoxedErrorResult<()> {
    let fx = Fixture::new();
    let followed = UserId::random();
    fx.follows.follow(fx.viewer, followed);
    fx.repo.seed(post_at(followed, "followed", 1));
    let engine = fx.engine_with(config(10, LiveMergePolicy::MatchFilter));

    let view = engine.open_view(fx.viewer, FilterMode::All).await?;

    fx.repo.close_gate();
    let switching = tokio::spawn({
        let view = view.clone();
        async move { view.switch_mode(FilterMode::Subscribed).await }
    });
    fx.repo.wait_fetch_calls(2).await;

    // only announced, so the fetch in flight can not return them
    fx.repo.announce(post_at(fx.other, "not followed", 100));
    fx.repo.announce(post_at(followed, "followed live", 101));
    wait_for_items(&view, |items| items.len() == 3).await;

    fx.repo.open_gate();
    switching.await??;

    assert_eq!(titles(&view.items()), ["followed live", "followed"]);
    Ok(())
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn live_posts_survive_refresh_in_flight() -> BoxedErrorResult<()> {
    let fx = Fixture::new();
    fx.seed_numbered(2);
    let view = fx.engine(10).open_view(fx.viewer, FilterMode::All).await?;

    fx.repo.close_gate();
    let refreshing = tokio::spawn({
        let view = view.clone();
        async move { view.refresh().await }
    });
    fx.repo.wait_fetch_calls(2).await;

    fx.repo.announce(post_at(fx.other, "live", 0));
    wait_for_items(&view, |items| items.len() == 3).await;

    fx.repo.open_gate();
    refreshing.await??;

    assert_eq!(titles(&view.items()), ["live", "1", "0"]);
    Ok(())
}
