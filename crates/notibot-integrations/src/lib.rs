pub mod activity;
pub mod grove;
pub mod http;
pub mod traits;
pub mod trello;

pub use activity::{Activity, ActivityKind, RawAction};
pub use grove::{GroveClient, GroveNotice};
pub use traits::{ActivitySource, Notifier, SourceCredentials};
pub use trello::{TrelloBoard, TrelloClient};
