//! Client registry.
//!
//! Owns every managed client, their registration order, and the three
//! distinguished references: the focused client, the topmost client (the
//! last one explicitly raised) and the fullscreen client. Clients are
//! stored in a slot map so handles stay valid, and detectably stale, after
//! removal.
//!
//! Nothing here talks to the X server; the window manager drives the
//! server side of every transition and records the outcome here.

use slotmap::SlotMap;
use x11rb::protocol::xproto::Window;

use crate::client::{Client, ClientId};
use crate::state::ClientState;
use crate::types::Rect;

/// Which handle a lookup matches against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    Window,
    Frame,
}

/// The fullscreen client together with the rectangle to restore it to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FullscreenSlot {
    pub client: ClientId,
    pub restore: Rect,
}

/// All managed clients plus focus, stacking and fullscreen bookkeeping.
#[derive(Debug, Default)]
pub struct ClientRegistry {
    clients: SlotMap<ClientId, Client>,
    /// Registration order, used by the taskbar and for cycling
    order: Vec<ClientId>,
    focused: Option<ClientId>,
    topmost: Option<ClientId>,
    fullscreen: Option<FullscreenSlot>,
    focus_count: u64,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a client at the end of the order
    pub fn insert(&mut self, client: Client) -> ClientId {
        let id = self.clients.insert(client);
        self.order.push(id);
        id
    }

    /// Drop a client from the registry, clearing every reference to it.
    pub fn unlink(&mut self, id: ClientId) -> Option<Client> {
        let client = self.clients.remove(id)?;
        self.order.retain(|&other| other != id);
        if self.focused == Some(id) {
            self.focused = None;
        }
        if self.topmost == Some(id) {
            self.topmost = None;
        }
        if self.fullscreen.map(|slot| slot.client) == Some(id) {
            self.fullscreen = None;
        }
        Some(client)
    }

    pub fn get(&self, id: ClientId) -> Option<&Client> {
        self.clients.get(id)
    }

    pub fn get_mut(&mut self, id: ClientId) -> Option<&mut Client> {
        self.clients.get_mut(id)
    }

    pub fn contains(&self, id: ClientId) -> bool {
        self.clients.contains_key(id)
    }

    /// Resolve a raw server handle to a managed client
    pub fn find(&self, handle: Window, lookup: Lookup) -> Option<ClientId> {
        self.order.iter().copied().find(|&id| {
            let client = &self.clients[id];
            match lookup {
                Lookup::Window => client.window == handle,
                Lookup::Frame => client.frame == handle,
            }
        })
    }

    /// Client handles in registration order
    pub fn ids(&self) -> &[ClientId] {
        &self.order
    }

    /// Clients in registration order
    pub fn iter(&self) -> impl Iterator<Item = (ClientId, &Client)> {
        self.order.iter().map(move |&id| (id, &self.clients[id]))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn focused(&self) -> Option<ClientId> {
        self.focused
    }

    pub fn topmost(&self) -> Option<ClientId> {
        self.topmost
    }

    pub fn set_topmost(&mut self, id: Option<ClientId>) {
        self.topmost = id;
    }

    pub fn fullscreen(&self) -> Option<ClientId> {
        self.fullscreen.map(|slot| slot.client)
    }

    /// Lifecycle state of a registered client. An iconified client counts
    /// as hidden even while it holds the fullscreen slot.
    pub fn state_of(&self, id: ClientId) -> Option<ClientState> {
        let client = self.clients.get(id)?;
        Some(if client.hidden {
            ClientState::Hidden
        } else if self.is_fullscreen(id) {
            ClientState::Fullscreen
        } else {
            ClientState::Normal
        })
    }

    pub fn is_fullscreen(&self, id: ClientId) -> bool {
        self.fullscreen() == Some(id)
    }

    /// Occupy the fullscreen slot. The caller restores any previous
    /// occupant first.
    pub fn set_fullscreen(&mut self, client: ClientId, restore: Rect) {
        self.fullscreen = Some(FullscreenSlot { client, restore });
    }

    /// Release the fullscreen slot, handing back its restore point
    pub fn take_fullscreen(&mut self) -> Option<FullscreenSlot> {
        self.fullscreen.take()
    }

    /// Restore rectangle of the fullscreen client, for caching geometry
    /// requests that arrive while it is fullscreen
    pub fn fullscreen_restore_mut(&mut self) -> Option<&mut Rect> {
        self.fullscreen.as_mut().map(|slot| &mut slot.restore)
    }

    /// Move focus to `candidate`, stamping it with the next focus order.
    ///
    /// Returns the previously focused client when focus actually changed,
    /// `None` when `candidate` already had it.
    pub fn transfer_focus(&mut self, candidate: Option<ClientId>) -> Option<Option<ClientId>> {
        if candidate == self.focused {
            return None;
        }
        let previous = self.focused;
        self.focused = candidate;
        self.focus_count += 1;
        if let Some(client) = candidate.and_then(|id| self.clients.get_mut(id)) {
            client.focus_order = self.focus_count;
        }
        Some(previous)
    }

    /// The visible client that most recently had focus.
    ///
    /// Ties go to the earliest registered client.
    pub fn previous_focused(&self) -> Option<ClientId> {
        let mut best: Option<(ClientId, u64)> = None;
        for (id, client) in self.iter() {
            if client.hidden {
                continue;
            }
            match best {
                Some((_, order)) if client.focus_order <= order => {}
                _ => best = Some((id, client.focus_order)),
            }
        }
        best.map(|(id, _)| id)
    }

    /// Client `cycle_previous` should activate: one step back from the
    /// focused client, wrapping from the first to the last.
    pub fn cycle_previous_target(&self) -> Option<ClientId> {
        if self.order.len() < 2 {
            return None;
        }
        let last = self.order.len() - 1;
        let index = match self.focused_index() {
            Some(0) | None => last,
            Some(i) => i - 1,
        };
        Some(self.order[index])
    }

    /// Client `cycle_next` should activate: one step forward from the
    /// focused client, wrapping from the last to the first.
    pub fn cycle_next_target(&self) -> Option<ClientId> {
        if self.order.len() < 2 {
            return None;
        }
        let index = match self.focused_index() {
            Some(i) if i + 1 < self.order.len() => i + 1,
            _ => 0,
        };
        Some(self.order[index])
    }

    fn focused_index(&self) -> Option<usize> {
        let focused = self.focused?;
        self.order.iter().position(|&id| id == focused)
    }

    /// Record the current hidden state of every client before a taskbar drag
    pub fn remember_hidden(&mut self) {
        for client in self.clients.values_mut() {
            client.was_hidden = client.hidden;
        }
    }

    /// Clear drag bookkeeping, keeping it only for the focused client
    pub fn forget_hidden(&mut self) {
        let focused = self.focused;
        for (id, client) in self.clients.iter_mut() {
            client.was_hidden = Some(id) == focused && client.hidden;
        }
    }

    /// Check the registry invariants, returning a description of each
    /// violation found.
    pub fn validate(&self) -> Vec<String> {
        let mut violations = Vec::new();

        for (name, reference) in [
            ("Focused", self.focused),
            ("Topmost", self.topmost),
            ("Fullscreen", self.fullscreen()),
        ] {
            if let Some(id) = reference {
                if !self.clients.contains_key(id) {
                    violations.push(format!("{} client {:?} is not registered", name, id));
                }
            }
        }

        if let Some(id) = self.topmost {
            if self.state_of(id) == Some(ClientState::Hidden) {
                violations.push(format!("Topmost client 0x{:x} is hidden", self.clients[id].window));
            }
        }

        if self.order.len() != self.clients.len() {
            violations.push(format!(
                "Order has {} entries but {} clients are registered",
                self.order.len(),
                self.clients.len()
            ));
        }

        for (id, client) in self.iter() {
            if self.find(client.window, Lookup::Window) != Some(id) {
                violations.push(format!("Window 0x{:x} is registered twice", client.window));
            }
        }

        violations
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry_with(windows: &[Window]) -> (ClientRegistry, Vec<ClientId>) {
        let mut registry = ClientRegistry::new();
        let ids = windows
            .iter()
            .map(|&w| {
                let mut client = Client::new(w, Rect::new(0, 0, 100, 100));
                client.frame = w + 0x1000;
                registry.insert(client)
            })
            .collect();
        (registry, ids)
    }

    #[test]
    fn test_find_by_window_and_frame() {
        let (registry, ids) = registry_with(&[10, 20]);
        assert_eq!(registry.find(20, Lookup::Window), Some(ids[1]));
        assert_eq!(registry.find(0x1000 + 10, Lookup::Frame), Some(ids[0]));
        assert_eq!(registry.find(0x1000 + 10, Lookup::Window), None);
        assert_eq!(registry.find(99, Lookup::Window), None);
    }

    #[test]
    fn test_previous_focused_skips_hidden() {
        let (mut registry, ids) = registry_with(&[1, 2, 3]);
        registry.get_mut(ids[0]).unwrap().focus_order = 5;
        registry.get_mut(ids[1]).unwrap().focus_order = 9;
        registry.get_mut(ids[1]).unwrap().hidden = true;
        registry.get_mut(ids[2]).unwrap().focus_order = 3;
        assert_eq!(registry.previous_focused(), Some(ids[0]));
    }

    #[test]
    fn test_previous_focused_none_when_all_hidden() {
        let (mut registry, ids) = registry_with(&[1]);
        registry.get_mut(ids[0]).unwrap().hidden = true;
        assert_eq!(registry.previous_focused(), None);
    }

    #[test]
    fn test_transfer_focus_stamps_candidate() {
        let (mut registry, ids) = registry_with(&[1, 2]);
        assert_eq!(registry.transfer_focus(Some(ids[0])), Some(None));
        assert_eq!(registry.transfer_focus(Some(ids[0])), None);
        assert_eq!(registry.transfer_focus(Some(ids[1])), Some(Some(ids[0])));
        assert!(registry.get(ids[1]).unwrap().focus_order > registry.get(ids[0]).unwrap().focus_order);
        assert_eq!(registry.focused(), Some(ids[1]));
    }

    #[test]
    fn test_cycle_targets_wrap() {
        let (mut registry, ids) = registry_with(&[1, 2, 3]);
        let (a, b, c) = (ids[0], ids[1], ids[2]);

        registry.transfer_focus(Some(b));
        assert_eq!(registry.cycle_previous_target(), Some(a));
        assert_eq!(registry.cycle_next_target(), Some(c));

        registry.transfer_focus(Some(c));
        assert_eq!(registry.cycle_next_target(), Some(a));

        registry.transfer_focus(Some(a));
        assert_eq!(registry.cycle_previous_target(), Some(c));

        registry.transfer_focus(None);
        assert_eq!(registry.cycle_previous_target(), Some(c));
        assert_eq!(registry.cycle_next_target(), Some(a));
    }

    #[test]
    fn test_cycle_needs_two_clients() {
        let (mut registry, ids) = registry_with(&[1]);
        registry.transfer_focus(Some(ids[0]));
        assert_eq!(registry.cycle_previous_target(), None);
        assert_eq!(registry.cycle_next_target(), None);
    }

    #[test]
    fn test_unlink_clears_references() {
        let (mut registry, ids) = registry_with(&[1, 2]);
        registry.transfer_focus(Some(ids[0]));
        registry.set_topmost(Some(ids[0]));
        registry.set_fullscreen(ids[0], Rect::new(1, 2, 3, 4));

        let client = registry.unlink(ids[0]).unwrap();
        assert_eq!(client.window, 1);
        assert_eq!(registry.focused(), None);
        assert_eq!(registry.topmost(), None);
        assert_eq!(registry.fullscreen(), None);
        assert_eq!(registry.ids(), &[ids[1]]);
        assert!(registry.get(ids[0]).is_none());
        assert!(registry.validate().is_empty());
    }

    #[test]
    fn test_stale_handle_after_reuse() {
        let (mut registry, ids) = registry_with(&[1]);
        registry.unlink(ids[0]);
        let new_id = registry.insert(Client::new(7, Rect::default()));
        assert_ne!(new_id, ids[0]);
        assert!(registry.get(ids[0]).is_none());
    }

    #[test]
    fn test_forget_hidden_keeps_focused_only() {
        let (mut registry, ids) = registry_with(&[1, 2]);
        for &id in &ids {
            registry.get_mut(id).unwrap().hidden = true;
        }
        registry.remember_hidden();
        assert!(registry.get(ids[1]).unwrap().was_hidden);
        registry.transfer_focus(Some(ids[0]));
        registry.forget_hidden();
        assert!(registry.get(ids[0]).unwrap().was_hidden);
        assert!(!registry.get(ids[1]).unwrap().was_hidden);
    }

    #[test]
    fn test_validate_flags_hidden_topmost() {
        let (mut registry, ids) = registry_with(&[1]);
        registry.set_topmost(Some(ids[0]));
        registry.get_mut(ids[0]).unwrap().hidden = true;
        let violations = registry.validate();
        assert_eq!(violations.len(), 1);
        assert!(violations[0].contains("hidden"));
    }

    #[test]
    fn test_state_of_follows_flags_and_fullscreen_slot() {
        let (mut registry, ids) = registry_with(&[1, 2]);
        assert_eq!(registry.state_of(ids[0]), Some(ClientState::Normal));

        registry.set_fullscreen(ids[1], Rect::new(0, 0, 100, 100));
        assert_eq!(registry.state_of(ids[1]), Some(ClientState::Fullscreen));

        registry.get_mut(ids[1]).unwrap().hidden = true;
        assert_eq!(registry.state_of(ids[1]), Some(ClientState::Hidden));

        registry.unlink(ids[0]);
        assert_eq!(registry.state_of(ids[0]), None);
    }
}
