use uuid::Uuid;

// ============================================================================
// Aggregate Pattern - Command → Events → State
// ============================================================================
//
// Key Principles:
// 1. Commands are validated against current state before anything changes
// 2. Validation yields events; events are facts that can no longer fail
// 3. State only changes by applying events
// 4. Callers never observe a half-applied command
//
// Aggregates are persisted as state (not rebuilt from history); the events
// they emit feed the audit log and metrics.
//
// ============================================================================

/// Generic Aggregate trait - every consistency boundary implements this
///
/// Type Parameters:
/// - `Event`: The domain event type for this aggregate
/// - `Command`: The command type for this aggregate
/// - `Error`: The error type for business rule violations
pub trait Aggregate: Sized + Send + Sync {
    type Event;
    type Command;
    type Error;

    /// Handle command and emit events (business logic, no mutation)
    fn handle_command(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error>;

    /// Apply an already-validated event to the state
    fn apply_event(&mut self, event: &Self::Event);

    /// Get aggregate ID
    fn aggregate_id(&self) -> Uuid;

    /// Version last loaded from (or written to) storage
    fn version(&self) -> i64;

    /// Validate a command and apply the resulting events in one step
    fn execute(&mut self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        let events = self.handle_command(command)?;
        for event in &events {
            self.apply_event(event);
        }
        Ok(events)
    }
}

/// Domain events carry a stable name used by audit entries and metrics
pub trait DomainEvent {
    fn event_type(&self) -> &'static str;
}
