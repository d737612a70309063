/// Argument vectors for the external tool.
///
/// `<tool> <device> [-o d|f|a] [-r] [-c] [-n] [-t] [-D <dir>]` sorts;
/// `<tool> <device> -l` lists. Every value is its own argv element, so
/// directory names with spaces reach the tool intact.
use crate::error::InvocationStage;
use crate::model::{Mode, OperationRequest, Volume};
use std::ffi::OsString;

/// Flag that switches the tool to list-only mode.
pub const LIST_FLAG: &str = "-l";

/// One planned run of the tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub stage: InvocationStage,
    pub args: Vec<OsString>,
}

/// Invocations needed for a request, in order. Sort requests always end
/// with a list pass so the caller sees the resulting order.
pub fn plan(request: &OperationRequest) -> Vec<Invocation> {
    let list = Invocation {
        stage: InvocationStage::List,
        args: list_args(&request.volume),
    };
    match request.mode {
        Mode::List => vec![list],
        Mode::Sort => vec![
            Invocation {
                stage: InvocationStage::Sort,
                args: sort_args(request),
            },
            list,
        ],
    }
}

pub fn list_args(volume: &Volume) -> Vec<OsString> {
    vec![volume.device.clone().into_os_string(), LIST_FLAG.into()]
}

pub fn sort_args(request: &OperationRequest) -> Vec<OsString> {
    let opts = &request.options;
    let mut args: Vec<OsString> = vec![request.volume.device.clone().into_os_string()];

    if let Some(order) = opts.order {
        args.push("-o".into());
        args.push(order.flag_value().into());
    }
    let switches = [
        (opts.reverse, "-r"),
        (opts.ignore_case, "-c"),
        (opts.natural, "-n"),
        (opts.by_modification, "-t"),
    ];
    args.extend(
        switches
            .into_iter()
            .filter(|(on, _)| *on)
            .map(|(_, flag)| OsString::from(flag)),
    );
    if let Some(scope) = &request.scope {
        args.push("-D".into());
        args.push(scope.into());
    }
    args
}

/// Render an argv for logs, quoting elements that contain whitespace.
pub fn display_args(args: &[OsString]) -> String {
    args.iter()
        .map(|a| {
            let s = a.to_string_lossy();
            if s.contains(char::is_whitespace) {
                format!("{s:?}")
            } else {
                s.into_owned()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ArbitrationHandle, SortOptions, SortOrder};
    use std::path::PathBuf;

    fn volume() -> Volume {
        Volume {
            device: PathBuf::from("/dev/sdb1"),
            name: "PLAYER".into(),
            mount_path: PathBuf::from("/media/PLAYER"),
            handle: ArbitrationHandle::new("/dev/sdb1"),
        }
    }

    fn strings(args: &[OsString]) -> Vec<String> {
        args.iter().map(|a| a.to_string_lossy().into_owned()).collect()
    }

    #[test]
    fn test_list_plan_is_single_list_pass() {
        let plan = plan(&OperationRequest::list(volume()));
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].stage, InvocationStage::List);
        assert_eq!(strings(&plan[0].args), ["/dev/sdb1", "-l"]);
    }

    #[test]
    fn test_sort_plan_ends_with_list() {
        let req = OperationRequest::sort(volume(), SortOptions::with_order(SortOrder::FilesFirst));
        let plan = plan(&req);
        let stages: Vec<_> = plan.iter().map(|i| i.stage).collect();
        assert_eq!(stages, [InvocationStage::Sort, InvocationStage::List]);
        assert_eq!(strings(&plan[0].args), ["/dev/sdb1", "-o", "f"]);
        assert_eq!(strings(&plan[1].args), ["/dev/sdb1", "-l"]);
    }

    #[test]
    fn test_scope_with_spaces_is_one_argument() {
        let req = OperationRequest::sort(volume(), SortOptions::with_order(SortOrder::Mixed))
            .with_scope("/My Music/Best Of/");
        assert_eq!(
            strings(&sort_args(&req)),
            ["/dev/sdb1", "-o", "a", "-D", "My Music/Best Of"]
        );
    }

    #[test]
    fn test_extra_switches() {
        let opts = SortOptions {
            order: Some(SortOrder::DirectoriesFirst),
            reverse: true,
            natural: true,
            ..SortOptions::default()
        };
        let req = OperationRequest::sort(volume(), opts);
        assert_eq!(strings(&sort_args(&req)), ["/dev/sdb1", "-o", "d", "-r", "-n"]);
    }

    #[test]
    fn test_no_order_means_no_o_flag() {
        let req = OperationRequest::sort(volume(), SortOptions::default());
        assert_eq!(strings(&sort_args(&req)), ["/dev/sdb1"]);
    }

    #[test]
    fn test_display_args_quotes_spaces() {
        let args = vec![OsString::from("-D"), OsString::from("My Music")];
        assert_eq!(display_args(&args), "-D \"My Music\"");
    }
}
