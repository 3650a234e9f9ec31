pub mod belief;
pub mod catalog;
pub mod game;
pub mod implication;
pub mod learner;
pub mod model;
pub mod selector;

pub struct AppInfo;

impl AppInfo {
    pub const fn name() -> &'static str {
        "twentyq"
    }

    pub const fn codename() -> &'static str {
        "Animal, Vegetable, Mineral"
    }

    pub const fn version() -> &'static str {
        env!("CARGO_PKG_VERSION")
    }
}

#[cfg(test)]
mod tests {
    use super::AppInfo;

    #[test]
    fn exposes_static_metadata() {
        assert_eq!(AppInfo::name(), "twentyq");
        assert_eq!(AppInfo::codename(), "Animal, Vegetable, Mineral");
        assert!(!AppInfo::version().is_empty());
    }
}
