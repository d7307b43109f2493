//! Subscriptions describe what a subscriber wants: which routing hash it
//! matches, an optional request packet that triggers the response, and
//! whether it keeps firing (callback) or fires exactly once.

use crate::{ChosenFields, Packet, RoutingHash};
use brickbus_core::DeviceUid;
use std::fmt;

/// Immutable interest description. Built once, registered with the
/// dispatcher, never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    chosen: ChosenFields,
    uid: DeviceUid,
    function_id: u8,
    request: Option<Packet>,
    is_callback: bool,
}

impl Subscription {
    pub fn new(
        chosen: ChosenFields,
        uid: DeviceUid,
        function_id: u8,
        request: Option<Packet>,
        is_callback: bool,
    ) -> Self {
        Subscription {
            chosen,
            uid,
            function_id,
            request,
            is_callback,
        }
    }

    /// Match on function id alone: any device, this function.
    pub fn for_function(function_id: u8, request: Option<Packet>, is_callback: bool) -> Self {
        Subscription::new(
            ChosenFields::FUNCTION_ID,
            DeviceUid::new(0),
            function_id,
            request,
            is_callback,
        )
    }

    /// Match on device uid and function id: this exact device and function.
    pub fn for_device(
        uid: DeviceUid,
        function_id: u8,
        request: Option<Packet>,
        is_callback: bool,
    ) -> Self {
        Subscription::new(ChosenFields::all(), uid, function_id, request, is_callback)
    }

    #[must_use]
    pub fn chosen(&self) -> ChosenFields {
        self.chosen
    }

    #[must_use]
    pub fn uid(&self) -> DeviceUid {
        self.uid
    }

    #[must_use]
    pub fn function_id(&self) -> u8 {
        self.function_id
    }

    #[must_use]
    pub fn request(&self) -> Option<&Packet> {
        self.request.as_ref()
    }

    /// `false` means the subscriber fires exactly once and is then removed
    /// from the registry by the dispatcher.
    #[must_use]
    pub fn is_callback(&self) -> bool {
        self.is_callback
    }

    /// Routing hash over the chosen fields.
    #[must_use]
    pub fn hash(&self) -> RoutingHash {
        RoutingHash::compute(self.chosen, self.uid, self.function_id)
    }
}

impl fmt::Display for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Subscription[chosen={:?}, uid={}, fid={}, request={}, callback={}]",
            self.chosen,
            self.uid,
            self.function_id,
            self.request.is_some(),
            self.is_callback
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_equivalence() {
        // equal iff chosen masks and every selected value match exactly
        let a = Subscription::for_device(DeviceUid::new(5), 1, None, false);
        let b = Subscription::for_device(DeviceUid::new(5), 1, None, true);
        assert_eq!(a.hash(), b.hash()); // request/callback do not participate

        let c = Subscription::for_device(DeviceUid::new(6), 1, None, false);
        assert_ne!(a.hash(), c.hash());

        let d = Subscription::for_function(1, None, false);
        assert_ne!(a.hash(), d.hash());
    }

    #[test]
    fn test_function_only_ignores_uid() {
        let a = Subscription::for_function(7, None, true);
        let b = Subscription::new(ChosenFields::FUNCTION_ID, DeviceUid::new(123), 7, None, true);
        assert_eq!(a.hash(), b.hash());
    }
}
