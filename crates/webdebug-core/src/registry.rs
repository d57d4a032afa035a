//! Static table of addressable pins.

/// GPIO numbers exposed to clients on an ESP32 DevKit board.
///
/// Flash pins (6-11) and pins without a pad are left out. 34, 35, 36 and 39
/// are input-only on the silicon.
pub const USABLE_PINS: [u8; 24] = [
    0, 2, 4, 5, 12, 13, 14, 15, 16, 17, 18, 19, 21, 22, 23, 25, 26, 27, 32, 33, 34, 35, 36, 39,
];

/// Ordered list of logical pin ids.
///
/// The position of a pin in the list is the index of its record in the
/// state store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinRegistry {
    pins: &'static [u8],
}

impl PinRegistry {
    /// Create a registry over a fixed pin list.
    pub const fn new(pins: &'static [u8]) -> Self {
        Self { pins }
    }

    /// Registry for the default ESP32 board.
    pub const fn esp32() -> Self {
        Self::new(&USABLE_PINS)
    }

    /// Position of `logical_id` in the table, if registered.
    ///
    /// Takes an `i32` because ids arrive from client text and may be negative.
    pub fn index_of(&self, logical_id: i32) -> Option<usize> {
        let id = u8::try_from(logical_id).ok()?;
        self.pins.iter().position(|&pin| pin == id)
    }

    pub fn contains(&self, logical_id: i32) -> bool {
        self.index_of(logical_id).is_some()
    }

    /// Logical id at `index`.
    pub fn pin_at(&self, index: usize) -> Option<u8> {
        self.pins.get(index).copied()
    }

    pub fn pins(&self) -> &'static [u8] {
        self.pins
    }

    pub fn len(&self) -> usize {
        self.pins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pins.is_empty()
    }
}

impl Default for PinRegistry {
    fn default() -> Self {
        Self::esp32()
    }
}
