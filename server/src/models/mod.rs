// server/src/models/mod.rs

//! Ledger entities: catalog, parties, orders, invoices, payments and notifications.

pub mod actor;
pub mod buyer;
pub mod invoice;
pub mod notification;
pub mod order;
pub mod payment;
pub mod product;
pub mod seller;

pub use actor::{Actor, ActorRole};
pub use buyer::{Buyer, NewBuyer, ShopAddress};
pub use invoice::{GatewayQr, Invoice, InvoiceLine, InvoiceStatus, PartySnapshot, PaymentRef};
pub use notification::Notification;
pub use order::{AuditEntry, DispatchInfo, Order, OrderLine, OrderPaymentStatus, OrderStatus};
pub use payment::{Payment, PaymentStatus};
pub use product::{NewProduct, Product};
pub use seller::{NewSeller, Seller};
