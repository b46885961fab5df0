//! Core shared types for the forecasting pipeline and trading simulation.
//!
//! This crate provides the data model every other crate speaks: session and
//! pipeline rows, the probability-market order/trade types, fixed-point
//! monetary values, and the closed set of trader identities.

pub mod forecast;
pub mod ids;
pub mod money;
pub mod order;
pub mod session;
pub mod trade;
pub mod trader;

pub use forecast::{
    normalize_factor_name, AgentLog, AgentStatus, Factor, ForecasterClass, ForecasterResponse,
    PhaseDurations, ResponseStatus,
};
pub use ids::{
    now, AgentLogId, FactorId, OrderId, ResponseId, SessionId, Timestamp, TradeId,
};
pub use money::{Cash, Price, Quantity};
pub use order::{Order, OrderSide, OrderStatus};
pub use session::{Phase, QuestionType, Session, SessionStatus};
pub use trade::{BookLevel, BookSnapshot, Trade};
pub use trader::{TraderName, TraderState, TraderType};
