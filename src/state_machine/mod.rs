// Order status state machine.
//
// An order starts in `processing` and moves exactly once into one of the terminal
// states `completed`, `failed` or `pending_delivery`.

pub mod events;
pub mod order_state_machine;
pub mod states;

pub use events::OrderEvent;
pub use order_state_machine::OrderStateMachine;
pub use states::OrderStatus;
