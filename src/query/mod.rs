pub mod compiler;
pub mod conditions;
pub mod filter;
pub mod sort;

pub use compiler::{CompiledQuery, CompiledRequest, QueryCompiler, RequestShape};
pub use conditions::{CompiledConditions, ConditionParser};
pub use filter::{FilterNode, RangeOperator};
