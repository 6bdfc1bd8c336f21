//! `o2cb_controld`'s line-oriented control protocol: a client writes a
//! space-separated request line, the daemon answers with one or more
//! response lines of the same shape. This module only frames and
//! parses messages; there is no real multi-node daemon behind it here
//! (see `dlm::LocalDlm`), so commands are modeled but not dispatched
//! to any backing process.
//!
//! Grounded in `examples/original_source/o2cb_controld/` client/daemon
//! message handling for the verb set and field ordering.

use crate::error::{Ocfs2Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Mount { uuid: String, service: String, device: String },
    MountResult { uuid: String, service: String, status: i32 },
    Unmount { uuid: String, service: String },
    Status { uuid: String },
    ListFs,
    ListMounts { uuid: String },
    ListClusters,
    ItemCount { count: u32 },
    Item { value: String },
    Dump,
}

impl Message {
    pub fn encode(&self) -> String {
        match self {
            Message::Mount { uuid, service, device } => format!("MOUNT {uuid} {service} {device}"),
            Message::MountResult { uuid, service, status } => {
                format!("MRESULT {uuid} {service} {status}")
            }
            Message::Unmount { uuid, service } => format!("UNMOUNT {uuid} {service}"),
            Message::Status { uuid } => format!("STATUS {uuid}"),
            Message::ListFs => "LISTFS".to_string(),
            Message::ListMounts { uuid } => format!("LISTMOUNTS {uuid}"),
            Message::ListClusters => "LISTCLUSTERS".to_string(),
            Message::ItemCount { count } => format!("ITEMCOUNT {count}"),
            Message::Item { value } => format!("ITEM {value}"),
            Message::Dump => "DUMP".to_string(),
        }
    }

    pub fn decode(line: &str) -> Result<Self> {
        let mut parts = line.split_whitespace();
        let verb = parts.next().ok_or_else(|| Ocfs2Error::InvalidArgument("empty message".into()))?;
        let rest: Vec<&str> = parts.collect();
        let missing = || Ocfs2Error::InvalidArgument(format!("{verb}: missing field"));
        match verb {
            "MOUNT" => Ok(Message::Mount {
                uuid: rest.first().ok_or_else(missing)?.to_string(),
                service: rest.get(1).ok_or_else(missing)?.to_string(),
                device: rest.get(2).ok_or_else(missing)?.to_string(),
            }),
            "MRESULT" => Ok(Message::MountResult {
                uuid: rest.first().ok_or_else(missing)?.to_string(),
                service: rest.get(1).ok_or_else(missing)?.to_string(),
                status: rest.get(2).ok_or_else(missing)?.parse().map_err(|_| missing())?,
            }),
            "UNMOUNT" => Ok(Message::Unmount {
                uuid: rest.first().ok_or_else(missing)?.to_string(),
                service: rest.get(1).ok_or_else(missing)?.to_string(),
            }),
            "STATUS" => Ok(Message::Status { uuid: rest.first().ok_or_else(missing)?.to_string() }),
            "LISTFS" => Ok(Message::ListFs),
            "LISTMOUNTS" => {
                Ok(Message::ListMounts { uuid: rest.first().ok_or_else(missing)?.to_string() })
            }
            "LISTCLUSTERS" => Ok(Message::ListClusters),
            "ITEMCOUNT" => Ok(Message::ItemCount {
                count: rest.first().ok_or_else(missing)?.parse().map_err(|_| missing())?,
            }),
            "ITEM" => Ok(Message::Item { value: rest.join(" ") }),
            "DUMP" => Ok(Message::Dump),
            other => Err(Ocfs2Error::InvalidArgument(format!("unknown message verb '{other}'"))),
        }
    }
}

/// A `LISTFS`/`LISTMOUNTS`/`LISTCLUSTERS` reply is an `ITEMCOUNT`
/// header followed by that many `ITEM` lines, the framing every list
/// response in the protocol shares.
pub fn encode_list(items: &[String]) -> Vec<String> {
    let mut lines = vec![Message::ItemCount { count: items.len() as u32 }.encode()];
    lines.extend(items.iter().map(|v| Message::Item { value: v.clone() }.encode()));
    lines
}

pub fn decode_list(lines: &[String]) -> Result<Vec<String>> {
    let mut iter = lines.iter();
    let header = iter.next().ok_or_else(|| Ocfs2Error::InvalidArgument("empty list reply".into()))?;
    let count = match Message::decode(header)? {
        Message::ItemCount { count } => count,
        _ => return Err(Ocfs2Error::InvalidArgument("list reply missing ITEMCOUNT header".into())),
    };
    let mut items = Vec::with_capacity(count as usize);
    for line in iter {
        match Message::decode(line)? {
            Message::Item { value } => items.push(value),
            _ => return Err(Ocfs2Error::InvalidArgument("expected ITEM line".into())),
        }
    }
    if items.len() != count as usize {
        return Err(Ocfs2Error::InvalidArgument("list reply item count mismatch".into()));
    }
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mount_round_trips() {
        let msg = Message::Mount {
            uuid: "abc123".to_string(),
            service: "ocfs2".to_string(),
            device: "/dev/sdb1".to_string(),
        };
        let line = msg.encode();
        assert_eq!(Message::decode(&line).unwrap(), msg);
    }

    #[test]
    fn list_round_trips() {
        let items = vec!["vol1".to_string(), "vol2".to_string()];
        let lines = encode_list(&items);
        assert_eq!(decode_list(&lines).unwrap(), items);
    }

    #[test]
    fn decode_rejects_unknown_verb() {
        assert!(Message::decode("BOGUS a b c").is_err());
    }

    #[test]
    fn decode_rejects_missing_fields() {
        assert!(Message::decode("MOUNT only-one-field").is_err());
    }
}
