//! FORGE Core - Plan Data Types
//!
//! Pure data structures with no behavior. `forge-lang`'s planner produces
//! these types; `forge-sql`'s query builder consumes them. Neither crate
//! re-derives the other's shape, so this crate is the single source of
//! truth for the compiled plan and the runtime artifact JSON it renders to.

mod plan;
mod value;

pub use plan::*;
pub use value::*;
