pub mod combo;
pub mod loaders;
pub mod portal;
pub mod unit_key;

pub use combo::{Combo, Year};
pub use loaders::load_combos;
pub use portal::PortalLayout;
pub use unit_key::UnitKey;
