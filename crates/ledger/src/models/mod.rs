//! Domain models for the stock ledger.

pub mod catalog;
pub mod movement;
pub mod stock;

pub use catalog::{CatalogProduct, Facility, Program};
pub use movement::{LotEvent, MovementHistoryEntry, MovementRequest, TimeRange};
pub use stock::{
    CalculatedStockOnHand, PhysicalInventory, PhysicalInventoryLine,
    PhysicalInventoryLineAdjustment, ProductLot, StockCard, StockCardLineItem, StockEvent,
};
