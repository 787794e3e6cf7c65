// dbclonetool/src/clone/script.rs
use chrono::NaiveDateTime;
use std::fmt;

use super::CloneRequest;
use super::discovery::MountResult;

/// One piece of the duplicate command, in the order it is emitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Clause {
    AllocateChannel(u32),
    DuplicateTo(String),
    UntilTime(NaiveDateTime),
    ParameterValueConvert { from: String, to: String },
    /// `set <parameter> = <value>`, value substituted verbatim.
    Set { parameter: &'static str, value: String },
    BackupLocation(String),
    Terminator { no_file_name_check: bool },
}

impl fmt::Display for Clause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Clause::AllocateChannel(n) => write!(f, "allocate auxiliary channel aux{} device type disk;", n),
            Clause::DuplicateTo(name) => write!(f, "duplicate database to {}", name),
            Clause::UntilTime(time) => write!(
                f,
                "until time \"TO_DATE('{}','YYYY-MM-DD HH24:MI:SS')\"",
                time.format("%Y-%m-%d %H:%M:%S")
            ),
            Clause::ParameterValueConvert { from, to } => {
                write!(f, "SPFILE parameter_value_convert ('{}','{}')", from, to)
            }
            Clause::Set { parameter, value } => write!(f, "set {} = {}", parameter, value),
            Clause::BackupLocation(path) => write!(f, "BACKUP LOCATION '{}'", path),
            Clause::Terminator { no_file_name_check: true } => f.write_str("NOFILENAMECHECK; }"),
            Clause::Terminator { no_file_name_check: false } => f.write_str("; }"),
        }
    }
}

/// Duplicate command as an ordered list of clauses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreScript {
    pub clauses: Vec<Clause>,
}

impl RestoreScript {
    pub fn build(request: &CloneRequest, mount: &MountResult) -> Self {
        let mut clauses: Vec<Clause> = (1..=request.parallelism).map(Clause::AllocateChannel).collect();
        clauses.push(Clause::DuplicateTo(request.new_name.clone()));

        if let Some(time) = request.time_restore {
            clauses.push(Clause::UntilTime(time));
        }
        if !request.policy.skip_parameter_file {
            clauses.push(Clause::ParameterValueConvert {
                from: request.source_db.clone(),
                to: request.new_name.clone(),
            });
        }

        let relocation = &request.relocation;
        let overrides = [
            ("control_files", &relocation.control_files),
            ("db_file_name_convert", &relocation.db_file_name_convert),
            ("log_file_name_convert", &relocation.log_file_name_convert),
            ("audit_file_dest", &relocation.audit_file_dest),
            ("core_dump_dest", &relocation.core_dump_dest),
        ];
        for (parameter, value) in overrides {
            if let Some(value) = value {
                clauses.push(Clause::Set { parameter, value: value.clone() });
            }
        }

        clauses.push(Clause::BackupLocation(mount.path.to_string_lossy().into_owned()));
        clauses.push(Clause::Terminator { no_file_name_check: request.policy.no_file_name_check });
        Self { clauses }
    }

    pub fn render(&self) -> String {
        let body: Vec<String> = self.clauses.iter().map(Clause::to_string).collect();
        format!("run {{ {}", body.join(" "))
    }
}

impl fmt::Display for RestoreScript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}
