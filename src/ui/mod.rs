pub mod icons;
pub mod output;
pub mod progress;
pub mod progress_message;
pub mod table;
pub mod theme;

pub use icons::Icons;
pub use output::{dim, error, header, info, section, success, summary_row, warn};
pub use progress::SeedProgress;
pub use progress_message::ProgressMessage;
pub use table::{EntityRow, entity_table};
pub use theme::{Theme, theme};
