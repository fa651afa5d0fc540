mod feeds;
mod schema;
mod types;

pub use schema::FeedStore;
pub use types::{
    Feed, FeedPriority, FeedStatus, FeedSubmission, FeedType, ImportSummary, LegacyFeedEntry,
    LegacyFeedList, StoreError,
};
