pub mod addresses;
pub mod cart;
pub mod checkout;
pub mod countdown;
pub mod domain;
pub mod order_merge;
pub mod ports;
pub mod pricing;
pub mod rewards;

pub use addresses::{AddressBook, AddressError};
pub use cart::Cart;
pub use checkout::{CheckoutError, CheckoutOutcome, CheckoutQuote, CheckoutRequest, CheckoutService};
pub use countdown::{CountdownPhase, OrderCountdown, SessionFlags};
pub use domain::{
    Address, AddressFields, CartItem, CoinAccount, CoinTransaction, CoinTransactionKind,
    NewCoinTransaction, NewOrder, OptInOutcome, Order, OrderAmendment, OrderLine, OrderTracking,
    PaymentMethod, Product, Profile, ProfileUpdate, RewardReceipt, WalletBalance,
};
pub use ports::{
    AddressRepository, BackendGateway, BlockchainGateway, CoinAccountRepository,
    CoinTransactionRepository, OrderRepository, PortError, PortResult, ProductRepository,
    ProfileRepository,
};
pub use pricing::PriceBreakdown;
pub use rewards::{CoinSummary, RewardError, Rewards};
