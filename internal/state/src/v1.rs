//! v1 is the original on-disk state format: a version byte followed by each
//! store encoded separately with `bincode`.

use std::{
    io::{Read, Write},
    sync::Arc,
};

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::{build, gate, Error, Manager};

const VERSION: u8 = 1;

#[derive(Deserialize, Serialize)]
struct Ser {
    version: u8,
    builds: Vec<u8>,
    gates: Vec<u8>,
}

pub(crate) async fn serialize_into<W>(manager: &Manager, writer: W) -> Result<(), Error>
where
    W: Write,
{
    let ser = Ser {
        version: VERSION,
        builds: bincode::serialize(&*manager.builds.read().await)?,
        gates: bincode::serialize(&*manager.gates.read().await)?,
    };

    Ok(bincode::serialize_into(writer, &ser)?)
}

pub(crate) fn deserialize_from<R>(reader: R) -> Result<Manager, Error>
where
    R: Read,
{
    let ser: Ser = bincode::deserialize_from(reader)?;

    if ser.version != VERSION {
        return Err(Error::UnknownSerialisationVersion(ser.version));
    }

    Ok(Manager {
        builds: Arc::new(RwLock::new(bincode::deserialize::<build::Store>(
            &ser.builds,
        )?)),
        gates: Arc::new(RwLock::new(bincode::deserialize::<gate::Store>(
            &ser.gates,
        )?)),
        edits: Default::default(),
    })
}
