// server/src/web/handlers/mod.rs

pub mod invoice_handlers;
pub mod order_handlers;
pub mod party_handlers;
pub mod product_handlers;
pub mod webhook_handlers;
