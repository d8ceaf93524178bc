pub mod accounts;
pub mod feed;
pub mod follow_graph;
pub mod hashtags;
pub mod posts;
pub mod privacy;
pub mod stories;

pub use accounts::{AccountService, RegisterAccount};
pub use feed::FeedService;
pub use follow_graph::FollowGraphService;
pub use hashtags::{HashtagService, ProcessedContent};
pub use posts::{NewPost, PostPatch, PostService, ReactionSummary, ReactionTally};
pub use privacy::{DenialReason, Visibility};
pub use stories::{NewStory, StoryService};
