//! HDF5 file parsing
//!
//! Turns an HDF5 file into a JSON object: file attributes under `"attrs"` and
//! every dataset under its absolute path (`/group/dataset`).

use hdf5::types::{TypeDescriptor, VarLenAscii, VarLenUnicode};
use hdf5::{Container, File, Group};
use serde_json::{Map, Value};
use std::path::Path;
use tracing::warn;

use crate::error::Result;

pub fn hdf5_to_value(path: &Path) -> Result<Value> {
    let file = File::open(path)?;
    let mut data = Map::new();

    let mut attrs = Map::new();
    for name in file.attr_names()? {
        let attr = file.attr(&name)?;
        attrs.insert(name, read_container(&attr)?);
    }
    data.insert("attrs".to_string(), Value::Object(attrs));

    collect_datasets(&file, &mut data)?;
    Ok(Value::Object(data))
}

fn collect_datasets(group: &Group, data: &mut Map<String, Value>) -> Result<()> {
    for dataset in group.datasets()? {
        data.insert(dataset.name(), read_container(&dataset)?);
    }
    for child in group.groups()? {
        collect_datasets(&child, data)?;
    }
    Ok(())
}

/// Read a dataset or attribute; scalars become a single value, arrays are flattened
fn read_container(container: &Container) -> Result<Value> {
    let values: Vec<Value> = match container.dtype()?.to_descriptor()? {
        TypeDescriptor::Integer(_) => container
            .read_raw::<i64>()?
            .into_iter()
            .map(Value::from)
            .collect(),
        TypeDescriptor::Unsigned(_) => container
            .read_raw::<u64>()?
            .into_iter()
            .map(Value::from)
            .collect(),
        TypeDescriptor::Float(_) => container
            .read_raw::<f64>()?
            .into_iter()
            .map(Value::from)
            .collect(),
        TypeDescriptor::Boolean => container
            .read_raw::<bool>()?
            .into_iter()
            .map(Value::from)
            .collect(),
        TypeDescriptor::VarLenUnicode => container
            .read_raw::<VarLenUnicode>()?
            .iter()
            .map(|s| Value::from(s.as_str()))
            .collect(),
        TypeDescriptor::VarLenAscii => container
            .read_raw::<VarLenAscii>()?
            .iter()
            .map(|s| Value::from(s.as_str()))
            .collect(),
        other => {
            warn!("Skipping HDF5 value of unsupported type {:?}", other);
            return Ok(Value::Null);
        }
    };

    if container.is_scalar() {
        Ok(values.into_iter().next().unwrap_or(Value::Null))
    } else {
        Ok(Value::Array(values))
    }
}

#[cfg(test)]
mod tests {
    use crate::config_utils::local_file::local_load;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn test_load_nested_groups_and_attrs() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("market.h5");
        {
            let file = hdf5::File::create(&path).unwrap();
            file.new_attr::<i64>()
                .create("version")
                .unwrap()
                .write_scalar(&3i64)
                .unwrap();
            file.new_dataset::<i64>()
                .create("count")
                .unwrap()
                .write_scalar(&7i64)
                .unwrap();
            let daily = file.create_group("prices").unwrap().create_group("daily").unwrap();
            daily
                .new_dataset_builder()
                .with_data(&[1.5f64, 2.5][..])
                .create("close")
                .unwrap();
        }

        let value = local_load(&path).unwrap();
        assert_eq!(value["attrs"], json!({"version": 3}));
        assert_eq!(value["/count"], json!(7));
        assert_eq!(value["/prices/daily/close"], json!([1.5, 2.5]));
    }
}
