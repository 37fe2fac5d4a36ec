//! One full foraging trip.
//!
//! ```text
//! START -> ACQUIRE -> WAIT_FOR_PICKUP -> TRANSPORT -> WAIT_FOR_DROP
//!              ^            |                ^            |
//!              +--failed----+                +--failed----+
//!
//! WAIT_FOR_DROP --nest--> LEAVING_NEST -> FINISHED
//! WAIT_FOR_DROP --cache--> FINISHED
//! ```
//!
//! The same machine serves all three roles; only the source and the
//! destination differ. Pickups and drops are carried out by the arena, so
//! the machine parks in a WAIT state until told how the attempt went.

use tracing::debug;

use fordyca_tasks::TaskKind;
use fordyca_types::{EntityRef, LedColor, Vec2};

use crate::config::ControllerParams;
use crate::hfsm::{Hfsm, HfsmState, Transition, row};
use crate::sensing::{Actuation, Sensing};

use super::acquire::{AcquireContext, AcquireGoalFsm, AcquisitionGoal};
use super::avoid;
use super::vector::{Goal, VectorFsm};

/// Which trip the machine makes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForagingRole {
    /// Free block to nest.
    Generalist,
    /// Free block to cache.
    Harvester,
    /// Cache to nest.
    Collector,
}

impl From<TaskKind> for ForagingRole {
    fn from(task: TaskKind) -> Self {
        match task {
            TaskKind::Generalist => Self::Generalist,
            TaskKind::Harvester => Self::Harvester,
            TaskKind::Collector => Self::Collector,
        }
    }
}

impl ForagingRole {
    const fn source(self) -> AcquisitionGoal {
        match self {
            Self::Generalist | Self::Harvester => AcquisitionGoal::FreeBlock,
            Self::Collector => AcquisitionGoal::ExistingCache,
        }
    }

    const fn delivers_to_cache(self) -> bool {
        matches!(self, Self::Harvester)
    }
}

/// Trip phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForagingPhase {
    /// Not started.
    Start,
    /// Finding the source.
    Acquire,
    /// At the source, waiting for the pickup to land.
    WaitForPickup,
    /// Carrying a block to the destination.
    Transport,
    /// At the destination, waiting for the drop to land.
    WaitForDrop,
    /// Driving out of the nest after a drop.
    LeavingNest,
    /// Trip complete.
    Finished,
}

impl HfsmState for ForagingPhase {
    fn parent(self) -> Option<Self> {
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ForagingEvent {
    Begin,
    Carrying,
    Acquired,
    PickedUp,
    PickupFailed,
    AtDestination,
    DroppedInNest,
    DroppedInCache,
    DropFailed,
    LeftNest,
}

const TABLE: &[Transition<ForagingPhase, ForagingEvent>] = &[
    row(ForagingPhase::Start, ForagingEvent::Begin, ForagingPhase::Acquire),
    row(ForagingPhase::Start, ForagingEvent::Carrying, ForagingPhase::Transport),
    row(ForagingPhase::Acquire, ForagingEvent::Acquired, ForagingPhase::WaitForPickup),
    row(ForagingPhase::WaitForPickup, ForagingEvent::PickedUp, ForagingPhase::Transport),
    row(ForagingPhase::WaitForPickup, ForagingEvent::PickupFailed, ForagingPhase::Acquire),
    row(ForagingPhase::Transport, ForagingEvent::AtDestination, ForagingPhase::WaitForDrop),
    row(ForagingPhase::WaitForDrop, ForagingEvent::DroppedInNest, ForagingPhase::LeavingNest),
    row(ForagingPhase::WaitForDrop, ForagingEvent::DroppedInCache, ForagingPhase::Finished),
    row(ForagingPhase::WaitForDrop, ForagingEvent::DropFailed, ForagingPhase::Transport),
    row(ForagingPhase::LeavingNest, ForagingEvent::LeftNest, ForagingPhase::Finished),
];

/// Where the machine is headed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForagingGoal {
    /// A free block.
    FreeBlock,
    /// A cache.
    ExistingCache,
    /// The nest.
    Nest,
}

impl From<AcquisitionGoal> for ForagingGoal {
    fn from(goal: AcquisitionGoal) -> Self {
        match goal {
            AcquisitionGoal::FreeBlock => Self::FreeBlock,
            AcquisitionGoal::ExistingCache => Self::ExistingCache,
        }
    }
}

/// An arena interaction the machine is waiting on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interaction {
    /// Pick up the free block underfoot.
    PickupBlock,
    /// Take a block from the cache underfoot.
    PickupFromCache,
    /// Drop the carried block in the nest.
    DropInNest,
    /// Drop the carried block into the cache underfoot.
    DropInCache,
}

/// The trip machine.
#[derive(Debug, Clone)]
pub struct ForagingFsm {
    fsm: Hfsm<ForagingPhase, ForagingEvent>,
    role: ForagingRole,
    acquire: AcquireGoalFsm,
    deliver: AcquireGoalFsm,
    home: VectorFsm,
    nest_tolerance: f64,
    speed: f64,
    carrying: bool,
}

impl ForagingFsm {
    /// Build an idle generalist machine.
    pub fn new(params: &ControllerParams, seed: u64) -> Self {
        Self {
            fsm: Hfsm::new("foraging", ForagingPhase::Start, TABLE),
            role: ForagingRole::Generalist,
            acquire: AcquireGoalFsm::new(params, AcquisitionGoal::FreeBlock, seed),
            deliver: AcquireGoalFsm::new(
                params,
                AcquisitionGoal::ExistingCache,
                seed.wrapping_add(1),
            ),
            home: VectorFsm::new(params),
            nest_tolerance: params.vector.nest_tolerance,
            speed: params.motion.max_speed,
            carrying: false,
        }
    }

    /// Begin a trip in `role`. A robot already holding a block goes
    /// straight to transport.
    pub fn start(&mut self, role: ForagingRole) {
        self.role = role;
        self.fsm.reset();
        self.acquire.set_goal(role.source());
        self.deliver.reset();
        self.home.reset();
        let event = if self.carrying {
            ForagingEvent::Carrying
        } else {
            ForagingEvent::Begin
        };
        self.fsm.dispatch(event);
        debug!(?role, carrying = self.carrying, "Foraging trip started");
    }

    /// Abandon the trip, keeping any held block.
    pub fn reset(&mut self) {
        self.fsm.reset();
        self.acquire.reset();
        self.deliver.reset();
        self.home.reset();
    }

    /// Role of the current trip.
    pub const fn role(&self) -> ForagingRole {
        self.role
    }

    /// Current phase.
    pub const fn phase(&self) -> ForagingPhase {
        self.fsm.current()
    }

    /// Whether the robot holds a block.
    pub const fn is_carrying(&self) -> bool {
        self.carrying
    }

    /// Whether the trip is over.
    pub const fn is_finished(&self) -> bool {
        matches!(self.fsm.current(), ForagingPhase::Finished)
    }

    /// Whether the robot is at a pickup or drop point.
    pub const fn at_interface(&self) -> bool {
        matches!(
            self.fsm.current(),
            ForagingPhase::WaitForPickup | ForagingPhase::WaitForDrop
        )
    }

    /// Whether the robot is exploring for its current goal.
    pub fn is_exploring(&self) -> bool {
        match self.fsm.current() {
            ForagingPhase::Acquire => self.acquire.is_exploring(),
            ForagingPhase::Transport => {
                self.role.delivers_to_cache() && self.deliver.is_exploring()
            }
            _ => false,
        }
    }

    /// Whether the robot is vectoring toward its current goal.
    pub fn is_vectoring(&self) -> bool {
        match self.fsm.current() {
            ForagingPhase::Acquire => self.acquire.is_vectoring(),
            ForagingPhase::Transport if self.role.delivers_to_cache() => {
                self.deliver.is_vectoring()
            }
            ForagingPhase::Transport => self.home.is_vectoring(),
            _ => false,
        }
    }

    /// Whether the current goal is under the robot.
    pub const fn goal_acquired(&self) -> bool {
        self.at_interface()
    }

    /// What the robot is currently after.
    pub fn acquisition_goal(&self) -> Option<ForagingGoal> {
        match self.fsm.current() {
            ForagingPhase::Acquire | ForagingPhase::WaitForPickup => {
                Some(self.role.source().into())
            }
            ForagingPhase::Transport | ForagingPhase::WaitForDrop => {
                Some(if self.role.delivers_to_cache() {
                    ForagingGoal::ExistingCache
                } else {
                    ForagingGoal::Nest
                })
            }
            _ => None,
        }
    }

    /// The arena interaction the robot is waiting on.
    pub const fn pending_interaction(&self) -> Option<Interaction> {
        match (self.fsm.current(), self.role) {
            (ForagingPhase::WaitForPickup, ForagingRole::Collector) => {
                Some(Interaction::PickupFromCache)
            }
            (ForagingPhase::WaitForPickup, _) => Some(Interaction::PickupBlock),
            (ForagingPhase::WaitForDrop, ForagingRole::Harvester) => Some(Interaction::DropInCache),
            (ForagingPhase::WaitForDrop, _) => Some(Interaction::DropInNest),
            _ => None,
        }
    }

    /// Targets found missing since the last call.
    pub fn take_vanished(&mut self) -> Vec<EntityRef> {
        let mut v = self.acquire.take_vanished();
        v.extend(self.deliver.take_vanished());
        v
    }

    /// The pickup succeeded.
    pub fn pickup_done(&mut self) {
        self.carrying = true;
        self.fsm.dispatch(ForagingEvent::PickedUp);
    }

    /// The pickup found nothing; search again.
    pub fn pickup_failed(&mut self) {
        if self.fsm.dispatch(ForagingEvent::PickupFailed).is_some() {
            self.acquire.reset();
        }
    }

    /// The drop succeeded.
    pub fn drop_done(&mut self) {
        self.carrying = false;
        let event = if self.role.delivers_to_cache() {
            ForagingEvent::DroppedInCache
        } else {
            ForagingEvent::DroppedInNest
        };
        self.fsm.dispatch(event);
    }

    /// The drop target was gone; find another.
    pub fn drop_failed(&mut self) {
        if self.fsm.dispatch(ForagingEvent::DropFailed).is_some() {
            self.deliver.reset();
            self.home.reset();
        }
    }

    /// Run one tick.
    pub fn step<S, A>(&mut self, sensors: &S, actuators: &mut A, ctx: &AcquireContext<'_>)
    where
        S: Sensing + ?Sized,
        A: Actuation + ?Sized,
    {
        match self.fsm.current() {
            ForagingPhase::Start | ForagingPhase::Finished => actuators.stop(),
            ForagingPhase::Acquire => {
                if self.acquire.step(sensors, actuators, ctx) {
                    self.fsm.dispatch(ForagingEvent::Acquired);
                    actuators.leds_set_color(LedColor::Yellow);
                }
            }
            ForagingPhase::WaitForPickup | ForagingPhase::WaitForDrop => {
                actuators.stop();
                actuators.leds_set_color(LedColor::Yellow);
            }
            ForagingPhase::Transport => self.transport(sensors, actuators, ctx),
            ForagingPhase::LeavingNest => self.leave_nest(sensors, actuators, ctx.nest),
        }
    }

    fn transport<S, A>(&mut self, sensors: &S, actuators: &mut A, ctx: &AcquireContext<'_>)
    where
        S: Sensing + ?Sized,
        A: Actuation + ?Sized,
    {
        if self.fsm.take_entry() {
            actuators.leds_set_color(LedColor::Green);
        }
        if self.role.delivers_to_cache() {
            if self.deliver.step(sensors, actuators, ctx) {
                self.fsm.dispatch(ForagingEvent::AtDestination);
            }
            return;
        }
        if sensors.in_nest() {
            actuators.stop();
            self.home.reset();
            self.fsm.dispatch(ForagingEvent::AtDestination);
            return;
        }
        if self.home.goal().is_none() || self.home.arrived() {
            self.home.set_goal(Goal {
                loc: ctx.nest,
                tolerance: self.nest_tolerance,
            });
        }
        self.home.step(sensors, actuators);
    }

    fn leave_nest<S, A>(&mut self, sensors: &S, actuators: &mut A, nest: Vec2)
    where
        S: Sensing + ?Sized,
        A: Actuation + ?Sized,
    {
        if !sensors.in_nest() {
            actuators.stop();
            self.fsm.dispatch(ForagingEvent::LeftNest);
            return;
        }
        if sensors.obstacle_detected() {
            avoid(sensors, actuators, self.speed);
            return;
        }
        let away = (sensors.position() - nest).normalized();
        let dir = if away.length() > 0.0 {
            away
        } else {
            Vec2::from_angle(sensors.heading())
        };
        actuators.set_heading(dir * self.speed);
        actuators.leds_set_color(LedColor::White);
    }
}
