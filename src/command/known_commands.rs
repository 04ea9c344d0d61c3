use lazy_static::lazy_static;
use std::collections::HashSet;

use crate::bson::Document;
use crate::error::{MdbError, MdbResult};

lazy_static! {
    /// The closed set of command names `select_command_name` will
    /// recognize in a parameter document's keys.
    static ref KNOWN_COMMANDS: HashSet<&'static str> = [
        // Aggregation Commands
        "aggregate", "count", "distinct", "group", "mapReduce",
        // Geospatial Commands
        "geoNear", "geoSearch",
        // Query and Write Operation Commands
        "find", "insert", "update", "delete", "findAndModify", "getMore",
        "getLastError", "getPrevError", "resetError", "eval", "parallelCollectionScan",
        // Query Plan Cache Commands
        "planCacheListFilters", "planCacheSetFilter", "planCacheClearFilters",
        "planCacheListQueryShapes", "planCacheListPlans", "planCacheClear",
        // Authentication Commands
        "logout", "authenticate", "copydbgetnonce", "getnonce", "authSchemaUpgrade",
        // User Management Commands
        "createUser", "updateUser", "dropUser", "dropAllUsersFromDatabase",
        "grantRolesToUser", "revokeRolesFromUser", "usersInfo",
        // Role Management Commands
        "createRole", "updateRole", "dropRole", "dropAllRolesFromDatabase",
        "grantPrivilegesToRole", "revokePrivilegesFromRole", "grantRolesToRole",
        "revokeRolesFromRole", "rolesInfo", "invalidateUserCache",
        // Replication Commands
        "replSetFreeze", "replSetGetStatus", "replSetInitiate", "replSetMaintenance",
        "replSetReconfig", "replSetStepDown", "replSetSyncFrom", "resync", "applyOps",
        "isMaster", "replSetGetConfig",
        // Sharding Commands
        "flushRouterConfig", "addShard", "balancerStart", "balancerStatus", "balancerStop",
        "cleanupOrphaned", "checkShardingIndex", "enableSharding", "listShards", "removeShard",
        "getShardMap", "getShardVersion", "mergeChunks", "setShardVersion", "shardCollection",
        "shardingState", "unsetSharding", "split", "splitChunk", "splitVector", "medianKey",
        "moveChunk", "movePrimary", "isdbgrid", "addShardToZone", "removeShardFromZone",
        "updateZoneKeyRange",
        // Instance Administration Commands
        "renameCollection", "copydb", "dropDatabase", "listCollections", "drop", "create",
        "clone", "cloneCollection", "cloneCollectionAsCapped", "convertToCapped", "filemd5",
        "createIndexes", "listIndexes", "deleteIndexes", "fsync", "clean", "connPoolSync",
        "connectionStatus", "compact", "collMod", "reIndex", "setParameter", "getParameter",
        "repairDatabase", "repairCursor", "touch", "shutdown", "logRotate", "killOp",
        "setFeatureCompatibilityVersion",
        // Diagnostic Commands
        "availableQueryOptions", "buildInfo", "collStats", "connPoolStats", "cursorInfo",
        "dataSize", "dbHash", "dbStats", "diagLogging", "driverOIDTest", "explain", "features",
        "getCmdLineOpts", "getLog", "hostInfo", "isSelf", "listCommands", "listDatabases",
        "netstat", "ping", "profile", "serverStatus", "shardConnPoolStats", "top", "validate",
        "whatsmyuri",
        // Internal Commands
        "handshake", "_recvChunkAbort", "_recvChunkCommit", "_recvChunkStart",
        "_recvChunkStatus", "_replSetFresh", "mapreduce.shardedfinish", "_transferMods",
        "replSetHeartbeat", "replSetGetRBID", "_migrateClone", "replSetElect",
        "writeBacksQueued", "writebacklisten",
        // Auditing Commands
        "logApplicationMessage", "saslStart", "saslContinue",
    ]
    .into_iter()
    .collect();
}

/// Picks the single command name out of a parameter document's keys.
///
/// `findAndModify` always wins when present, since it is commonly
/// issued alongside keys (`query`, `update`, `sort`, …) that also
/// happen to appear in the known-command set for other commands.
pub(crate) fn select_command_name(args: &Document) -> MdbResult<String> {
    let matches: Vec<&str> = args
        .keys()
        .filter(|k| KNOWN_COMMANDS.contains(k))
        .collect();

    if matches.iter().any(|&k| k == "findAndModify") {
        return Ok("findAndModify".to_owned());
    }
    match matches.as_slice() {
        [single] => Ok((*single).to_owned()),
        _ => Err(MdbError::BadCommand),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc;

    #[test]
    fn selects_the_sole_known_command() {
        let args = doc! {"ping" => 1.0_f64};
        assert_eq!(select_command_name(&args).unwrap(), "ping");
    }

    #[test]
    fn find_and_modify_wins_precedence() {
        let args = doc! {"findAndModify" => "pets", "query" => doc!{}, "update" => doc!{}};
        assert_eq!(select_command_name(&args).unwrap(), "findAndModify");
    }

    #[test]
    fn rejects_ambiguous_or_unknown_documents() {
        assert!(select_command_name(&doc! {"notACommand" => 1.0_f64}).is_err());
        assert!(select_command_name(&doc! {"find" => "a", "count" => "a"}).is_err());
    }
}
