//! Approximate memory footprint of a snapshot.
//!
//! Size tracking is optional and purely informative. Estimators run on the
//! blocking pool after a successful reload; a panicking estimator is caught
//! and logged, and the previously recorded size is kept.

use std::collections::HashMap;
use std::mem::size_of;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use crate::loader::Entries;

/// Approximate number of bytes a value occupies, including owned heap data.
///
/// Implement it by hand for domain types, typically by summing the fields:
///
/// ```
/// use reservoir_core::MemSize;
///
/// struct Channel {
///     id: u32,
///     title: String,
/// }
///
/// impl MemSize for Channel {
///     fn mem_size(&self) -> u64 {
///         self.id.mem_size() + self.title.mem_size()
///     }
/// }
///
/// let channel = Channel { id: 7, title: String::from("news") };
/// assert!(channel.mem_size() >= 4 + 4);
/// ```
pub trait MemSize {
    fn mem_size(&self) -> u64;
}

macro_rules! impl_mem_size_for_plain {
    ($($ty:ty),* $(,)?) => {
        $(
            impl MemSize for $ty {
                fn mem_size(&self) -> u64 {
                    size_of::<$ty>() as u64
                }
            }
        )*
    };
}

impl_mem_size_for_plain!(
    bool, char, u8, u16, u32, u64, u128, usize, i8, i16, i32, i64, i128, isize, f32, f64, ()
);

impl MemSize for String {
    fn mem_size(&self) -> u64 {
        (size_of::<String>() + self.capacity()) as u64
    }
}

impl MemSize for str {
    fn mem_size(&self) -> u64 {
        self.len() as u64
    }
}

impl<T: MemSize> MemSize for Option<T> {
    fn mem_size(&self) -> u64 {
        let inline = size_of::<Option<T>>() as u64;
        match self {
            // Count the payload's heap part only, its inline part is in `inline`.
            Some(value) => inline + value.mem_size().saturating_sub(size_of::<T>() as u64),
            None => inline,
        }
    }
}

impl<T: MemSize> MemSize for Vec<T> {
    fn mem_size(&self) -> u64 {
        let spare = (self.capacity() - self.len()) * size_of::<T>();
        let items: u64 = self.iter().map(MemSize::mem_size).sum();
        (size_of::<Vec<T>>() + spare) as u64 + items
    }
}

impl<T: MemSize + ?Sized> MemSize for Box<T> {
    fn mem_size(&self) -> u64 {
        size_of::<Box<T>>() as u64 + (**self).mem_size()
    }
}

impl<T: MemSize + ?Sized> MemSize for Arc<T> {
    fn mem_size(&self) -> u64 {
        // Two reference counters live next to the value.
        (size_of::<Arc<T>>() + 2 * size_of::<usize>()) as u64 + (**self).mem_size()
    }
}

impl<K: MemSize, V: MemSize, S> MemSize for HashMap<K, V, S> {
    fn mem_size(&self) -> u64 {
        let buckets = (self.capacity() * size_of::<(K, V)>()) as u64;
        let heap: u64 = self
            .iter()
            .map(|(k, v)| {
                let inline = (size_of::<K>() + size_of::<V>()) as u64;
                (k.mem_size() + v.mem_size()).saturating_sub(inline)
            })
            .sum();
        size_of::<HashMap<K, V, S>>() as u64 + buckets + heap
    }
}

/// Computes the size of a whole snapshot.
pub type SizeEstimator<K, T> = Arc<dyn Fn(&Entries<K, T>) -> u64 + Send + Sync>;

/// Sums the size of every key and value of a snapshot.
///
/// Values are shared through `Arc`, so the reference-counted allocation is
/// attributed to the snapshot exactly once per entry.
pub fn entries_size<K: MemSize, T: MemSize>(entries: &Entries<K, T>) -> u64 {
    entries
        .iter()
        .map(|(key, value)| key.mem_size() + value.as_ref().mem_size())
        .sum()
}

/// Runs `estimator`, turning a panic into the panic message.
pub(crate) fn estimate_isolated<K, T>(
    estimator: &SizeEstimator<K, T>,
    entries: &Entries<K, T>,
) -> Result<u64, String> {
    catch_unwind(AssertUnwindSafe(|| estimator(entries))).map_err(|panic| {
        panic
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| panic.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string())
    })
}
