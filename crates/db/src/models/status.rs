//! Status helper enums mapping to SMALLINT lookup tables.
//!
//! Each enum variant's discriminant matches the seed data order (1-based)
//! in the corresponding `*_statuses` database table.

/// Status ID type matching SMALLINT/SMALLSERIAL in the database.
pub type StatusId = i16;

macro_rules! define_status_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident = $val:expr ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[repr(i16)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub enum $name {
            $( $(#[$vmeta])* $variant = $val ),+
        }

        impl $name {
            /// Return the database status ID.
            pub fn id(self) -> StatusId {
                self as StatusId
            }
        }

        impl From<$name> for StatusId {
            fn from(value: $name) -> Self {
                value as StatusId
            }
        }
    };
}

define_status_enum! {
    /// Sync job execution status. Succeeded, Failed, and Cancelled are
    /// terminal and write-once.
    JobStatus {
        Pending = 1,
        Running = 2,
        Succeeded = 3,
        Failed = 4,
        Cancelled = 5,
        Paused = 6,
    }
}

impl JobStatus {
    /// Human-readable name matching the `sync.job_statuses` seed data.
    pub fn name(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
            Self::Paused => "paused",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_status_ids_match_seed_data() {
        assert_eq!(JobStatus::Pending.id(), 1);
        assert_eq!(JobStatus::Running.id(), 2);
        assert_eq!(JobStatus::Succeeded.id(), 3);
        assert_eq!(JobStatus::Failed.id(), 4);
        assert_eq!(JobStatus::Cancelled.id(), 5);
        assert_eq!(JobStatus::Paused.id(), 6);
    }

    #[test]
    fn status_into_status_id() {
        let id: StatusId = JobStatus::Running.into();
        assert_eq!(id, 2);
    }

    #[test]
    fn ids_agree_with_core_state_machine() {
        use parcelsync_core::jobs::state_machine;
        assert!(state_machine::is_terminal(JobStatus::Succeeded.id()));
        assert!(state_machine::is_terminal(JobStatus::Failed.id()));
        assert!(state_machine::is_terminal(JobStatus::Cancelled.id()));
        assert!(state_machine::can_transition(
            JobStatus::Running.id(),
            JobStatus::Paused.id()
        ));
    }
}
