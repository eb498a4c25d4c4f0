//! Request and response models for screening and causality testing.

pub mod causality;
pub mod strategy;

pub use causality::{
    CausalityRequest, CausalityResponse, CausalityResultItem, CausalityVerdict, DirectionOutcome,
    PerLagResult, TestDirection,
};
pub use strategy::{
    ComparisonOperator, Condition, ConditionValue, IndicatorType, MatchDetail, Market,
    ScreeningResult, ScreeningResultItem, SortOrder, Strategy, StrategyLogic, TimeFrame,
};
