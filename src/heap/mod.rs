mod error;
mod row;
mod table_heap;
mod tid;

pub use error::{HeapError, HeapResult};
pub use row::{Value, decode_row, encode_row};
pub use table_heap::{LockRegistry, TableHeap, TidScan};
pub use tid::Tid;
