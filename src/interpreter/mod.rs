//! Statement interpreter for agent-based models.
//!
//! Model code arrives as serializable descriptions ([`ir`]), is checked and
//! turned into executable statements by [`builder`], and runs against a
//! [`Scope`](crate::runtime::scope::Scope) on behalf of one agent at a time.
//! Statements that act on other agents (`ask`, `create`, `capture`, ...)
//! live in [`dispatch`]; container mutation lives in [`mutation`].

/// Actions: named, parameterized statement blocks owned by species.
pub mod action;
/// Formal and actual arguments.
pub mod args;
/// Builders that translate descriptions into executable statements.
pub mod builder;
/// Mutable container values.
pub mod container;
/// Statements that run code on behalf of other agents.
pub mod dispatch;
/// Expressions.
pub mod expr;
/// Serializable statement and model descriptions.
pub mod ir;
/// Loops.
pub mod looping;
/// `add`, `remove` and `put`.
pub mod mutation;
/// Statements and sequences.
pub mod statement;
/// `try` / `catch`.
pub mod try_catch;
/// Runtime values and their types.
pub mod value;

pub use action::Action;
pub use args::{Arguments, FormalArg};
pub use builder::{Builder, Diagnostic, Model};
pub use dispatch::{
    AskStatement, CaptureStatement, CreateStatement, DoStatement, MigrateStatement,
    ReleaseStatement,
};
pub use expr::{BinaryOp, Expr, Expression};
pub use ir::{ModelDesc, SpeciesDesc, StatementDesc};
pub use looping::LoopStatement;
pub use mutation::{ContainerFacets, ContainerStatement, ItemRole, MutationKind};
pub use statement::{RemoteSequence, Sequence, Statement};
pub use try_catch::TryStatement;
pub use value::{TypeDescriptor, Value, ValueType};
