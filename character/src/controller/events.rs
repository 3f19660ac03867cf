/*!
Observer lists for controller events.

Handlers run in subscription order. A handler must not subscribe or unsubscribe on the same
controller while it is being dispatched; the controller is mutably borrowed during dispatch so the
borrow checker enforces this for handlers that capture the controller itself.
*/

use crate::{
    math::{Quat, Vec3},
    scene::CharacterHit,
};

use super::CharacterState;

/// Token returned by the `on_*` subscription methods.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Capsule height was committed.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HeightChanged {
    pub height: f32,
    /// Distance the feet moved along `up` to keep the resize pivot fixed.
    pub root_offset: f32,
}

/// The character was moved instantly.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Teleported {
    pub from: Vec3,
    pub to: Vec3,
    pub rotation: Quat,
}

pub struct Observers<E> {
    handlers: Vec<(SubscriptionId, Box<dyn FnMut(&E)>)>,
}

impl<E> Default for Observers<E> {
    fn default() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }
}

impl<E> Observers<E> {
    fn add(&mut self, id: SubscriptionId, handler: Box<dyn FnMut(&E)>) {
        self.handlers.push((id, handler));
    }

    fn remove(&mut self, id: SubscriptionId) -> bool {
        let before = self.handlers.len();
        self.handlers.retain(|(h, _)| *h != id);
        self.handlers.len() != before
    }

    pub fn notify(&mut self, event: &E) {
        for (_, handler) in self.handlers.iter_mut() {
            handler(event);
        }
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

/// All observer lists of one controller. Ids are unique across lists.
#[derive(Default)]
pub struct ControllerEvents {
    next_id: u64,
    pub height_changed: Observers<HeightChanged>,
    pub teleported: Observers<Teleported>,
    pub hit: Observers<CharacterHit>,
    pub moved: Observers<CharacterState>,
}

impl ControllerEvents {
    fn next(&mut self) -> SubscriptionId {
        self.next_id += 1;
        SubscriptionId(self.next_id)
    }

    pub fn on_height_changed(&mut self, f: impl FnMut(&HeightChanged) + 'static) -> SubscriptionId {
        let id = self.next();
        self.height_changed.add(id, Box::new(f));
        id
    }

    pub fn on_teleported(&mut self, f: impl FnMut(&Teleported) + 'static) -> SubscriptionId {
        let id = self.next();
        self.teleported.add(id, Box::new(f));
        id
    }

    pub fn on_hit(&mut self, f: impl FnMut(&CharacterHit) + 'static) -> SubscriptionId {
        let id = self.next();
        self.hit.add(id, Box::new(f));
        id
    }

    pub fn on_moved(&mut self, f: impl FnMut(&CharacterState) + 'static) -> SubscriptionId {
        let id = self.next();
        self.moved.add(id, Box::new(f));
        id
    }

    /// Remove a handler from whichever list holds it.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.height_changed.remove(id)
            || self.teleported.remove(id)
            || self.hit.remove(id)
            || self.moved.remove(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{cell::RefCell, rc::Rc};

    #[test]
    fn handlers_run_in_order_until_unsubscribed() {
        let mut events = ControllerEvents::default();
        let log = Rc::new(RefCell::new(Vec::new()));

        let a = log.clone();
        let first = events.on_height_changed(move |e| a.borrow_mut().push(("a", e.height)));
        let b = log.clone();
        events.on_height_changed(move |e| b.borrow_mut().push(("b", e.height)));

        let event = HeightChanged {
            height: 1.2,
            root_offset: 0.0,
        };
        events.height_changed.notify(&event);
        assert!(events.unsubscribe(first));
        assert!(!events.unsubscribe(first));
        events.height_changed.notify(&event);

        assert_eq!(*log.borrow(), vec![("a", 1.2), ("b", 1.2), ("b", 1.2)]);
    }

    #[test]
    fn ids_are_unique_across_lists() {
        let mut events = ControllerEvents::default();
        let a = events.on_teleported(|_| {});
        let b = events.on_moved(|_| {});
        assert_ne!(a, b);
        assert!(events.unsubscribe(b));
        assert!(events.moved.is_empty());
        assert_eq!(events.teleported.len(), 1);
    }
}
