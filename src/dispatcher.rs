//! The command dispatcher, delivering datapoint writes with retries and acknowledgement tracking.
//!
//! The dispatcher never blocks. [`Dispatcher::send`] transmits and returns a [`CommandHandle`];
//! the outcome of the command is queued as a [`Resolution`] once it is known. Timer expiry is
//! driven by the caller through [`Dispatcher::poll`], using [`Dispatcher::next_deadline`] to know
//! when to call it next.

use alloc::vec::Vec;
use log::{debug, trace, warn};

use crate::{
    error::{Error, Result},
    retry::RetryConfig,
    transport::Transport,
    types::{DatapointNumber, DatapointValue, Instant},
};

/// One pending slot per datapoint number.
pub const PENDING_SLOTS: usize = 256;

/// Number of resolutions buffered before the oldest is dropped.
///
/// A single [`Dispatcher::poll`] resolves at most one command per pending slot, so nothing is
/// lost as long as the queue is drained after every call.
pub const RESOLUTION_QUEUE_LEN: usize = PENDING_SLOTS;

/// How an outbound command ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckResult {
    /// Sent once without acknowledgement tracking.
    Sent,
    /// The MCU acknowledged the command.
    Acknowledged,
    /// Never acknowledged after the configured number of attempts.
    RetryExhausted,
    /// Replaced by a newer command for the same datapoint. Not an error.
    Superseded,
}

impl AckResult {
    pub const fn is_failure(self) -> bool {
        matches!(self, Self::RetryExhausted)
    }
}

/// Identifies one [`Dispatcher::send`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CommandHandle {
    number: DatapointNumber,
    sequence: u32,
}

impl CommandHandle {
    pub const fn number(&self) -> DatapointNumber {
        self.number
    }
}

/// Outcome of a command, delivered through [`Dispatcher::pop_resolution`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub handle: CommandHandle,
    pub result: AckResult,
    /// Transmissions made for this command.
    pub attempts: u8,
}

/// One in-flight write awaiting acknowledgement.
#[derive(Debug)]
struct PendingCommand {
    handle: CommandHandle,
    value: DatapointValue,
    payload: Vec<u8>,
    attempts: u8,
    deadline: Instant,
    retry: RetryConfig,
}

/// Sends datapoint values and tracks at most one pending command per datapoint.
pub struct Dispatcher {
    pending: [Option<PendingCommand>; PENDING_SLOTS],
    resolutions: heapless::Deque<Resolution, RESOLUTION_QUEUE_LEN>,
    next_sequence: u32,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    pub fn new() -> Self {
        Self {
            pending: core::array::from_fn(|_| None),
            resolutions: heapless::Deque::new(),
            next_sequence: 0,
        }
    }

    /// Send `value` to datapoint `number`.
    ///
    /// An outstanding command for the same datapoint is resolved as [`AckResult::Superseded`]
    /// first. With retries disabled the command resolves as [`AckResult::Sent`] right away.
    /// If the first transmission fails the error is returned and nothing stays pending.
    pub fn send<T: Transport>(
        &mut self,
        transport: &mut T,
        now: Instant,
        number: DatapointNumber,
        value: DatapointValue,
        retry: RetryConfig,
    ) -> Result<CommandHandle, T::Error> {
        let handle = CommandHandle {
            number,
            sequence: self.next_sequence,
        };
        self.next_sequence = self.next_sequence.wrapping_add(1);

        if let Some(previous) = self.pending[usize::from(number)].take() {
            debug!("[DP{}] Superseding pending command", number);
            self.resolve(previous.handle, AckResult::Superseded, previous.attempts);
        }

        let payload = value.encode();
        trace!("[DP{}] Sending {:?}", number, value);
        transport
            .transmit(number, value.wire_type(), &payload)
            .map_err(Error::SerialError)?;

        if !retry.enabled() {
            self.resolve(handle, AckResult::Sent, 1);
            return Ok(handle);
        }

        let deadline = retry.deadline_from(now);
        debug!(
            "[DP{}] Scheduling retry timeout: {}ms ({} attempts)",
            number,
            retry.timeout().to_millis(),
            retry.count()
        );
        self.pending[usize::from(number)] = Some(PendingCommand {
            handle,
            value,
            payload,
            attempts: 1,
            deadline,
            retry,
        });
        Ok(handle)
    }

    /// Acknowledge the pending command of `number`.
    ///
    /// Correlation is by datapoint number only, so a late acknowledgement of an older write
    /// satisfies the current one.
    pub fn acknowledge(&mut self, number: DatapointNumber) -> Option<CommandHandle> {
        let command = self.pending[usize::from(number)].take()?;
        debug!("[DP{}] MCU confirmed value, canceling retry", number);
        self.resolve(command.handle, AckResult::Acknowledged, command.attempts);
        Some(command.handle)
    }

    /// Acknowledge the pending command of `number` if the MCU reported back the value it carries.
    pub fn acknowledge_echo(
        &mut self,
        number: DatapointNumber,
        reported: &DatapointValue,
    ) -> Option<CommandHandle> {
        match &self.pending[usize::from(number)] {
            Some(command) if command.value == *reported => self.acknowledge(number),
            _ => None,
        }
    }

    /// Handle every deadline that passed at `now`: resend, or give up once all attempts are spent.
    ///
    /// A failed retransmission still counts as an attempt.
    pub fn poll<T: Transport>(&mut self, transport: &mut T, now: Instant) {
        for slot in self.pending.iter_mut() {
            let Some(command) = slot else {
                continue;
            };
            if now < command.deadline {
                continue;
            }

            let number = command.handle.number;
            if command.attempts < command.retry.count() {
                let wire_type = command.value.wire_type();
                if let Err(err) = transport.transmit(number, wire_type, &command.payload) {
                    warn!("[DP{}] Retransmission failed: {:?}", number, err);
                }
                command.attempts += 1;
                command.deadline = command.retry.deadline_from(now);
                warn!(
                    "[DP{}] MCU did not confirm value, retrying send ({} retries left)",
                    number,
                    command.retry.count() - command.attempts
                );
            } else if let Some(command) = slot.take() {
                warn!(
                    "[DP{}] MCU did not confirm value after {} attempts",
                    number, command.attempts
                );
                push_resolution(
                    &mut self.resolutions,
                    Resolution {
                        handle: command.handle,
                        result: AckResult::RetryExhausted,
                        attempts: command.attempts,
                    },
                );
            }
        }
    }

    /// Earliest deadline of all pending commands.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending
            .iter()
            .flatten()
            .map(|command| command.deadline)
            .min()
    }

    pub fn is_pending(&self, number: DatapointNumber) -> bool {
        self.pending[usize::from(number)].is_some()
    }

    /// Deadline of the pending command of `number`.
    pub fn deadline(&self, number: DatapointNumber) -> Option<Instant> {
        self.pending[usize::from(number)]
            .as_ref()
            .map(|command| command.deadline)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.iter().flatten().count()
    }

    /// Take the oldest queued resolution.
    pub fn pop_resolution(&mut self) -> Option<Resolution> {
        self.resolutions.pop_front()
    }

    fn resolve(&mut self, handle: CommandHandle, result: AckResult, attempts: u8) {
        push_resolution(
            &mut self.resolutions,
            Resolution {
                handle,
                result,
                attempts,
            },
        );
    }
}

fn push_resolution(
    queue: &mut heapless::Deque<Resolution, RESOLUTION_QUEUE_LEN>,
    resolution: Resolution,
) {
    if let Err(resolution) = queue.push_back(resolution) {
        warn!("Resolution queue full, dropping oldest");
        queue.pop_front();
        let _ = queue.push_back(resolution);
    }
}
