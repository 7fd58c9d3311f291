// core/src/model/mod.rs

pub mod cart;
pub mod ids;
pub mod money;
pub mod order;
pub mod payment;
pub mod variant;

pub use cart::{Cart, CartLine, CartSnapshot};
pub use ids::{BuyerRef, StoreRef, VariantRef};
pub use money::{Money, CURRENCY_CODE};
pub use order::{Order, OrderLine, OrderNumber, OrderState, OrderStatus, PaymentStatus, ShippingAddress};
pub use payment::{AttemptStatus, PaymentAttempt, PaymentMethod, PaymentOutcome};
pub use variant::VariantRecord;
