pub mod penguins_csv;

pub use penguins_csv::{read_penguins, read_penguins_with_config, PenguinReaderConfig};
