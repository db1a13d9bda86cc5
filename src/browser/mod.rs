pub mod chrome;
pub mod headless;
pub mod session;

pub use chrome::{ChromeSession, ChromeSessionFactory};
pub use headless::launch_headless_browser;
pub use session::{BrowserSession, SessionFactory, WaitCondition};
