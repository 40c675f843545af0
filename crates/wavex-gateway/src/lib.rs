//! Exchange gateway contract for the WAVEX trading bot.
//!
//! The position and risk layers consume the exchange only through the
//! [`ExchangeGateway`] trait defined here. The concrete REST/WebSocket
//! connector (signing, retries, JSON decoding) lives outside this
//! workspace and implements the same trait.
//!
//! Two in-repo implementations are provided:
//! - [`MockExchangeGateway`]: scripted, call-recording; for tests
//! - [`PaperGateway`]: in-memory fill engine; for paper-trading mode

pub mod error;
pub mod gateway;
pub mod mock;
pub mod paper;
pub mod types;

pub use error::{GatewayError, GatewayResult};
pub use gateway::{BoxFuture, DynGateway, ExchangeGateway};
pub use mock::MockExchangeGateway;
pub use paper::PaperGateway;
pub use types::{
    BillRecord, BusinessType, LeverageMode, ModifyTpslParams, OrderParams, PlacedOrder,
    PlanOrder, PlanOrderParams, Position,
};
