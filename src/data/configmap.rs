use crate::data::config::Config;
use serenity::prelude::TypeMapKey;
use std::sync::Arc;

pub(crate) struct ConfigMap;

impl TypeMapKey for ConfigMap {
    type Value = Arc<Config>;
}
