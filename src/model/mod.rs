pub mod catboost;

pub use catboost::CatBoostModel;
