//! Feed Query Planner
//!
//! Turns a filter mode, the viewer and the cursor position into a bounded
//! repository fetch.

use plaza_core::{FetchSpec, FilterMode, PostFilter, UserId};
use snafu::ResultExt as _;
use tracing::debug;

use crate::collab::FollowGraph;
use crate::cursor::PageCursor;
use crate::error::{FeedResult, FollowGraphSnafu};
use crate::LOG_TARGET;

pub async fn plan(
    mode: FilterMode,
    viewer_id: UserId,
    cursor: &PageCursor,
    follows: &dyn FollowGraph,
) -> FeedResult<FetchSpec> {
    let filter = match mode {
        // `for_you` candidates are all published posts, the selection
        // happens after the fetch
        FilterMode::All | FilterMode::ForYou => PostFilter::Published,
        FilterMode::Creator(creator_id) => PostFilter::Creator(creator_id),
        FilterMode::Subscribed => {
            let following = follows
                .following(viewer_id)
                .await
                .context(FollowGraphSnafu)?;
            if following.is_empty() {
                debug!(target: LOG_TARGET, %viewer_id, "Viewer follows nobody");
                return Ok(FetchSpec::Empty);
            }
            PostFilter::Creators(following.into_iter().collect())
        }
    };

    Ok(FetchSpec::Fetch {
        filter,
        offset: cursor.offset(),
        limit: cursor.page_size(),
    })
}
