mod date;
mod interval;
mod rows;
mod ticker;

pub use date::{date_from_unix, iso_date, parse_date, DateRange};
pub use interval::BarInterval;
pub use rows::{Bar, Observation};
pub use ticker::Ticker;
