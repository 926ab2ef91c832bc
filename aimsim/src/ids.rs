use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! id_type {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                write!(f, "{}{}", stringify!($name), self.0)
            }
        }
    };
}

id_type!(RoadId, "A road spec's declared ID.");
id_type!(RoadLaneId, "One lane of a road, identified by (road, lane index) flattened to an int at load time.");
id_type!(IntersectionId, "An intersection spec's declared ID.");
id_type!(IntersectionLaneId, "A single inbound-to-outbound connector lane inside an intersection.");
id_type!(SpawnerId, "A spawner spec's declared ID.");
id_type!(RemoverId, "A remover spec's declared ID.");
