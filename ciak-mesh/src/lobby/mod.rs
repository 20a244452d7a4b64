mod lobby;

pub use lobby::*;
