//! The device runtime, the single owner of all datapoint state.
//!
//! [`Device`] ties the registry, the dispatcher, the router and the entities together. Inbound
//! reports, acknowledgements and timer expiry are applied one at a time, in the order the caller
//! delivers them. Everything observable is queued as an [`Event`].

use alloc::vec::Vec;
use log::{debug, info, warn};

use crate::{
    dispatcher::{CommandHandle, Dispatcher, Resolution},
    entity::{Commands, Entity, Intent},
    error::{DatapointError, Error, Result},
    registry::Registry,
    retry::RetryConfig,
    router::{Diagnostic, Router, RouterStats},
    transport::{DatapointUnits, Transport},
    types::{DatapointNumber, DatapointValue, EntityId, Instant},
};

/// Maximum number of entities one device holds.
pub const MAX_ENTITIES: usize = 64;

/// Number of events buffered before the oldest is dropped.
pub const EVENT_QUEUE_LEN: usize = 32;

/// Something the caller may want to observe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// The state of an entity changed, from a report, an intent or a revert.
    StateChanged(EntityId),
    /// A command reached its outcome.
    CommandResolved {
        /// Entity that issued the command.
        entity: Option<EntityId>,
        resolution: Resolution,
    },
    Diagnostic(Diagnostic),
}

pub struct Device<T: Transport> {
    transport: T,
    registry: Registry,
    dispatcher: Dispatcher,
    router: Router,
    entities: Vec<Entity>,
    /// Issuer of every command without a resolution yet.
    issuers: Vec<(CommandHandle, EntityId)>,
    events: heapless::Deque<Event, EVENT_QUEUE_LEN>,
}

impl<T: Transport> Device<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            registry: Registry::new(),
            dispatcher: Dispatcher::new(),
            router: Router::new(),
            entities: Vec::new(),
            issuers: Vec::new(),
            events: heapless::Deque::new(),
        }
    }

    /// Add an entity and register its datapoints.
    ///
    /// Fails with a [`DatapointError::Conflict`] if a
    /// datapoint is already bound with an incompatible type. The registry is left untouched then.
    pub fn add_entity(&mut self, entity: impl Into<Entity>) -> Result<EntityId, T::Error> {
        let entity = entity.into();
        if self.entities.len() >= MAX_ENTITIES {
            return Err(Error::TooManyEntities);
        }
        let id = EntityId::new(self.entities.len() as u16);

        let mut staged = self.registry.clone();
        for (number, datapoint_type) in entity.bindings() {
            staged.register(number, datapoint_type, id)?;
        }
        self.registry = staged;

        info!("Added {} entity {:?}", <&'static str>::from(entity.kind()), id);
        self.entities.push(entity);
        Ok(id)
    }

    /// Issue the one-off writes entities need at start-up.
    pub fn start(&mut self, now: Instant) -> Result<(), T::Error> {
        for index in 0..self.entities.len() {
            let id = EntityId::new(index as u16);
            let mut commands = Commands::new();
            self.entities[index].startup_commands(&self.registry, &mut commands);
            for command in commands {
                self.dispatch(id, command.number, command.value, command.retry, now)?;
            }
        }
        Ok(())
    }

    /// Apply an intent to an entity and send the resulting writes.
    ///
    /// Writes produced before an intent error are still sent.
    pub fn command(&mut self, id: EntityId, intent: Intent, now: Instant) -> Result<(), T::Error> {
        let entity = self
            .entities
            .get_mut(id.index())
            .ok_or(Error::UnknownEntity(id))?;
        let mut commands = Commands::new();
        let outcome = entity.handle_intent(intent, &self.registry, &mut commands);

        if !commands.is_empty() {
            self.push_event(Event::StateChanged(id));
        }
        let mut commands = commands.into_iter();
        while let Some(command) = commands.next() {
            if let Err(err) = self.dispatch(id, command.number, command.value, command.retry, now) {
                // Writes after the failed one were never sent, nothing will confirm them.
                for unsent in commands {
                    self.revert(id, unsent.number);
                }
                return Err(err);
            }
        }
        outcome.map_err(Error::from)
    }

    /// Handle one inbound datapoint report, then any deadline that passed at `now`.
    pub fn deliver(&mut self, number: DatapointNumber, type_code: u8, raw: &[u8], now: Instant) {
        self.route(number, type_code, raw);
        self.poll(now);
    }

    /// Handle a status payload holding any number of datapoint units.
    pub fn deliver_units(&mut self, payload: &[u8], now: Instant) {
        for unit in DatapointUnits::new(payload) {
            match unit {
                Ok(unit) => self.route(unit.number, unit.type_code, unit.value),
                Err(err) => {
                    warn!("Discarding status payload: {}", err);
                    let remaining = match err {
                        DatapointError::Truncated(remaining) => remaining,
                        _ => 0,
                    };
                    self.push_event(Event::Diagnostic(Diagnostic::Truncated { remaining }));
                }
            }
        }
        self.poll(now);
    }

    /// Handle an acknowledgement of a write to `number`.
    pub fn deliver_ack(&mut self, number: DatapointNumber) -> Option<CommandHandle> {
        let handle = self.dispatcher.acknowledge(number);
        self.drain_resolutions();
        handle
    }

    /// Retransmit or give up on every command whose deadline passed at `now`.
    pub fn poll(&mut self, now: Instant) {
        self.dispatcher.poll(&mut self.transport, now);
        self.drain_resolutions();
    }

    /// When [`Device::poll`] should be called next.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.dispatcher.next_deadline()
    }

    pub fn pop_event(&mut self) -> Option<Event> {
        self.events.pop_front()
    }

    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(id.index())
    }

    pub fn entities(&self) -> impl Iterator<Item = (EntityId, &Entity)> {
        self.entities
            .iter()
            .enumerate()
            .map(|(index, entity)| (EntityId::new(index as u16), entity))
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn router_stats(&self) -> RouterStats {
        self.router.stats()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    fn route(&mut self, number: DatapointNumber, type_code: u8, raw: &[u8]) {
        let (delivery, diagnostic) =
            match self.router.on_message(&mut self.registry, number, type_code, raw) {
                Ok(routed) => routed,
                Err(diagnostic) => {
                    self.push_event(Event::Diagnostic(diagnostic));
                    return;
                }
            };
        if let Some(diagnostic) = diagnostic {
            self.push_event(Event::Diagnostic(diagnostic));
        }

        for owner in delivery.owners.iter().copied() {
            let Some(entity) = self.entities.get_mut(owner.index()) else {
                continue;
            };
            if entity.handle_datapoint(number, &delivery.value) {
                self.push_event(Event::StateChanged(owner));
            }
        }

        self.dispatcher.acknowledge_echo(number, &delivery.value);
        self.drain_resolutions();
    }

    fn dispatch(
        &mut self,
        issuer: EntityId,
        number: DatapointNumber,
        value: DatapointValue,
        retry: RetryConfig,
        now: Instant,
    ) -> Result<(), T::Error> {
        match self
            .dispatcher
            .send(&mut self.transport, now, number, value, retry)
        {
            Ok(handle) => {
                self.issuers.push((handle, issuer));
                self.drain_resolutions();
                Ok(())
            }
            Err(err) => {
                // A supersession may have been queued before the transmission failed.
                self.drain_resolutions();
                self.revert(issuer, number);
                Err(err)
            }
        }
    }

    fn drain_resolutions(&mut self) {
        while let Some(resolution) = self.dispatcher.pop_resolution() {
            let entity = self
                .issuers
                .iter()
                .position(|(handle, _)| *handle == resolution.handle)
                .map(|position| self.issuers.swap_remove(position).1);

            if resolution.result.is_failure()
                && let Some(id) = entity
            {
                self.revert(id, resolution.handle.number());
            }
            debug!(
                "[DP{}] Command resolved as {:?}",
                resolution.handle.number(),
                resolution.result
            );
            self.push_event(Event::CommandResolved { entity, resolution });
        }
    }

    /// Drop the optimistic state `id` holds for `number`.
    fn revert(&mut self, id: EntityId, number: DatapointNumber) {
        if let Some(entity) = self.entities.get_mut(id.index())
            && entity.command_failed(number)
        {
            self.push_event(Event::StateChanged(id));
        }
    }

    fn push_event(&mut self, event: Event) {
        if let Err(event) = self.events.push_back(event) {
            warn!("Event queue full, dropping oldest");
            self.events.pop_front();
            let _ = self.events.push_back(event);
        }
    }
}
