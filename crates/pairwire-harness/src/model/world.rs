//! Model world: clients, queue and pairings.

use std::collections::VecDeque;

use super::operation::{ClientId, Operation};

/// What a client observes, with connection ids replaced by client ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelOutput {
    /// `waiting_for_match`.
    WaitingForMatch,
    /// `match_found`, naming who the room was formed with.
    MatchFound {
        /// The other member.
        partner: ClientId,
    },
    /// `is_initiator`.
    IsInitiator(bool),
    /// Relayed `signal`.
    Signal {
        /// Client that sent it.
        from: ClientId,
        /// Payload marker.
        seq: u16,
    },
    /// Relayed `receive_message`.
    Chat {
        /// Message marker.
        seq: u16,
    },
    /// `partner_disconnected`.
    PartnerDisconnected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ModelState {
    Offline,
    Idle,
    Queued,
    Paired(ClientId),
}

#[derive(Debug, Clone)]
struct ModelClient {
    state: ModelState,
    inbox: Vec<ModelOutput>,
}

/// Reference implementation of matchmaking and relay.
#[derive(Debug, Clone)]
pub struct ModelWorld {
    clients: Vec<ModelClient>,
    queue: VecDeque<ClientId>,
}

impl ModelWorld {
    /// World with `num_clients` clients, none connected.
    pub fn new(num_clients: usize) -> Self {
        let clients = (0..num_clients)
            .map(|_| ModelClient { state: ModelState::Offline, inbox: Vec::new() })
            .collect();
        Self { clients, queue: VecDeque::new() }
    }

    /// Number of clients in the world.
    pub fn num_clients(&self) -> usize {
        self.clients.len()
    }

    /// Whether the client currently has a connection.
    pub fn is_connected(&self, client_id: ClientId) -> bool {
        self.state(client_id).is_some_and(|state| state != ModelState::Offline)
    }

    /// Whether the client is waiting in the queue.
    pub fn is_queued(&self, client_id: ClientId) -> bool {
        self.state(client_id) == Some(ModelState::Queued)
    }

    /// The client's partner, if paired.
    pub fn partner_of(&self, client_id: ClientId) -> Option<ClientId> {
        match self.state(client_id)? {
            ModelState::Paired(partner) => Some(partner),
            _ => None,
        }
    }

    /// Queued clients, head first.
    pub fn queue(&self) -> impl Iterator<Item = ClientId> + '_ {
        self.queue.iter().copied()
    }

    /// Take everything the client has observed since the last call.
    pub fn take_inbox(&mut self, client_id: ClientId) -> Vec<ModelOutput> {
        self.clients
            .get_mut(usize::from(client_id))
            .map(|client| std::mem::take(&mut client.inbox))
            .unwrap_or_default()
    }

    /// Apply an operation. Operations on unknown clients are ignored.
    pub fn apply(&mut self, op: &Operation) {
        let client_id = op.client_id();
        let Some(state) = self.state(client_id) else {
            return;
        };

        match (*op, state) {
            (Operation::Connect { .. }, ModelState::Offline) => {
                self.set_state(client_id, ModelState::Idle);
            },
            (Operation::Connect { .. }, _) | (_, ModelState::Offline) => {},
            (Operation::Disconnect { .. }, _) => {
                self.leave(client_id);
                self.set_state(client_id, ModelState::Offline);
            },
            (Operation::JoinQueue { .. }, ModelState::Idle) => self.join(client_id),
            (Operation::JoinQueue { .. }, _) => {},
            (Operation::LeaveRoom { .. }, _) => self.leave(client_id),
            (Operation::Signal { seq, .. }, ModelState::Paired(partner)) => {
                self.push(partner, ModelOutput::Signal { from: client_id, seq });
            },
            (Operation::SendMessage { seq, .. }, ModelState::Paired(partner)) => {
                self.push(partner, ModelOutput::Chat { seq });
            },
            (Operation::Signal { .. } | Operation::SendMessage { .. }, _) => {},
        }
    }

    fn join(&mut self, client_id: ClientId) {
        match self.queue.pop_front() {
            Some(receiver) => {
                self.set_state(receiver, ModelState::Paired(client_id));
                self.set_state(client_id, ModelState::Paired(receiver));
                self.push(receiver, ModelOutput::MatchFound { partner: client_id });
                self.push(receiver, ModelOutput::IsInitiator(false));
                self.push(client_id, ModelOutput::MatchFound { partner: receiver });
                self.push(client_id, ModelOutput::IsInitiator(true));
            },
            None => {
                self.queue.push_back(client_id);
                self.set_state(client_id, ModelState::Queued);
                self.push(client_id, ModelOutput::WaitingForMatch);
            },
        }
    }

    fn leave(&mut self, client_id: ClientId) {
        match self.state(client_id) {
            Some(ModelState::Queued) => {
                self.queue.retain(|&queued| queued != client_id);
                self.set_state(client_id, ModelState::Idle);
            },
            Some(ModelState::Paired(partner)) => {
                self.set_state(partner, ModelState::Idle);
                self.set_state(client_id, ModelState::Idle);
                self.push(partner, ModelOutput::PartnerDisconnected);
            },
            _ => {},
        }
    }

    fn state(&self, client_id: ClientId) -> Option<ModelState> {
        self.clients.get(usize::from(client_id)).map(|client| client.state)
    }

    fn set_state(&mut self, client_id: ClientId, state: ModelState) {
        if let Some(client) = self.clients.get_mut(usize::from(client_id)) {
            client.state = state;
        }
    }

    fn push(&mut self, client_id: ClientId, output: ModelOutput) {
        if let Some(client) = self.clients.get_mut(usize::from(client_id)) {
            client.inbox.push(output);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn world_with(connected: &[ClientId]) -> ModelWorld {
        let mut world = ModelWorld::new(4);
        for &client_id in connected {
            world.apply(&Operation::Connect { client_id });
        }
        world
    }

    #[test]
    fn second_joiner_initiates() {
        let mut world = world_with(&[0, 1]);
        world.apply(&Operation::JoinQueue { client_id: 0 });
        world.apply(&Operation::JoinQueue { client_id: 1 });

        assert_eq!(world.take_inbox(0), vec![
            ModelOutput::WaitingForMatch,
            ModelOutput::MatchFound { partner: 1 },
            ModelOutput::IsInitiator(false),
        ]);
        assert_eq!(world.take_inbox(1), vec![
            ModelOutput::MatchFound { partner: 0 },
            ModelOutput::IsInitiator(true),
        ]);
    }

    #[test]
    fn disconnect_notifies_partner_and_frees_them() {
        let mut world = world_with(&[0, 1]);
        world.apply(&Operation::JoinQueue { client_id: 0 });
        world.apply(&Operation::JoinQueue { client_id: 1 });
        world.take_inbox(0);

        world.apply(&Operation::Disconnect { client_id: 1 });

        assert_eq!(world.take_inbox(0), vec![ModelOutput::PartnerDisconnected]);
        assert_eq!(world.partner_of(0), None);
        assert!(!world.is_queued(0));
        assert!(!world.is_connected(1));
    }

    #[test]
    fn relay_only_while_paired() {
        let mut world = world_with(&[0, 1]);
        world.apply(&Operation::Signal { client_id: 0, seq: 1 });
        assert!(world.take_inbox(1).is_empty());

        world.apply(&Operation::JoinQueue { client_id: 0 });
        world.apply(&Operation::JoinQueue { client_id: 1 });
        world.take_inbox(0);
        world.take_inbox(1);

        world.apply(&Operation::Signal { client_id: 0, seq: 2 });
        world.apply(&Operation::SendMessage { client_id: 1, seq: 3 });

        assert_eq!(world.take_inbox(1), vec![ModelOutput::Signal { from: 0, seq: 2 }]);
        assert_eq!(world.take_inbox(0), vec![ModelOutput::Chat { seq: 3 }]);
    }

    #[test]
    fn queued_leave_removes_from_queue() {
        let mut world = world_with(&[0]);
        world.apply(&Operation::JoinQueue { client_id: 0 });
        world.apply(&Operation::LeaveRoom { client_id: 0 });

        assert_eq!(world.queue().count(), 0);
        assert!(!world.is_queued(0));
    }
}
