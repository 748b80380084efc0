//! Seams to the handshake/association layer.
//!
//! The engine never owns a connection. It asks the context whether an origin
//! is reachable and hands advertisements to whatever association it returns.

use std::sync::Arc;

use crate::protocol::ControlMessage;
use crate::value::NodeIdentity;

pub trait Association {
    fn remote_address(&self) -> &NodeIdentity;

    /// True once the handshake layer has quarantined `origin_id`.
    fn is_quarantined(&self, origin_id: u64) -> bool;

    /// True while ordinary (non-control) messages are flowing.
    fn is_message_stream_active(&self) -> bool;

    /// Fire-and-forget delivery on the control stream.
    fn send_control(&self, message: ControlMessage);
}

pub trait InboundContext {
    type Association: Association;

    /// Identity stamped on every advertisement this node sends.
    fn local_address(&self) -> &NodeIdentity;

    fn association(&self, origin_id: u64) -> Option<Self::Association>;

    /// True once an association to `origin_id` existed and was torn down.
    /// An origin still completing its handshake is not lost.
    fn is_association_lost(&self, _origin_id: u64) -> bool {
        false
    }
}

impl<A: Association + ?Sized> Association for Arc<A> {
    fn remote_address(&self) -> &NodeIdentity {
        (**self).remote_address()
    }

    fn is_quarantined(&self, origin_id: u64) -> bool {
        (**self).is_quarantined(origin_id)
    }

    fn is_message_stream_active(&self) -> bool {
        (**self).is_message_stream_active()
    }

    fn send_control(&self, message: ControlMessage) {
        (**self).send_control(message)
    }
}

impl<C: InboundContext + ?Sized> InboundContext for Arc<C> {
    type Association = C::Association;

    fn local_address(&self) -> &NodeIdentity {
        (**self).local_address()
    }

    fn association(&self, origin_id: u64) -> Option<Self::Association> {
        (**self).association(origin_id)
    }

    fn is_association_lost(&self, origin_id: u64) -> bool {
        (**self).is_association_lost(origin_id)
    }
}
