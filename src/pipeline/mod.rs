//! Lead pipeline: stages, grouping and stage transitions.
//!
//! ## Module Map
//!
//! ```text
//!   drag_end(lead, stage)
//!          │
//!          v
//!   board.rs  (Board: stages, leads, pending transition)
//!          │
//!          │ gate::decide()
//!          v
//!   gate.rs ──── Ignore ──────────────> no-op
//!          │ ─── Commit ──────────────> commit.rs ──> LeadStore
//!          │ ─── Capture ──> forms.rs (validate) ──> commit.rs
//!          v
//!   grouping.rs  (StageGroups for rendering)
//! ```
//!
//! | Module     | Responsibility                                           |
//! |------------|----------------------------------------------------------|
//! | `models`   | `Stage`, `Lead`, `FormType`, `CaptureFields`, API bodies |
//! | `grouping` | Partition leads into stage columns                       |
//! | `gate`     | Decide what a drop does                                  |
//! | `forms`    | Convert / Lost / Junk forms and their validation         |
//! | `commit`   | Persist a move through a `LeadStore`                     |
//! | `board`    | Stateful controller tying the above together             |

pub mod board;
pub mod commit;
pub mod forms;
pub mod gate;
pub mod grouping;
pub mod models;

pub use board::{Board, DragOutcome, SubmitOutcome};
pub use forms::{CaptureForm, FormInput, FormOptions};
pub use gate::{GateDecision, IgnoreReason, PendingTransition};
pub use grouping::{StageGroup, StageGroups, group_leads_by_stage};
pub use models::{FormType, Lead, LeadId, Stage, StageId};
