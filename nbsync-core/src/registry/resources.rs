//! Built-in resource declarations.

use super::{FieldKind, FieldSpec, ResourceSchema};
use crate::model::TargetState::{self, Absent, New, Present};

const PRESENT_ABSENT: &[TargetState] = &[Present, Absent];

/// `scope_type` values and the resource each one selects.
pub(super) const SCOPE_TYPES: &[(&str, &str)] = &[
    ("dcim.location", "location"),
    ("dcim.rack", "rack"),
    ("dcim.region", "region"),
    ("dcim.site", "site"),
    ("dcim.sitegroup", "site_group"),
];

const CLUSTER_SCOPE: &[&str] = &["scope_type", "scope"];

const SITE_STATUS: &[&str] = &["planned", "staging", "active", "decommissioning", "retired"];

pub(super) fn all() -> Vec<ResourceSchema> {
    vec![
        contact(),
        data_source(),
        journal_entry(),
        rack_reservation(),
        cluster(),
        console_port(),
        device_role(),
        tag(),
        contact_group(),
        tenant(),
        tenant_group(),
        site(),
        region(),
        site_group(),
        location(),
        rack(),
        device(),
        user(),
        cluster_type(),
        cluster_group(),
    ]
}

fn needs(
    state: TargetState,
    fields: &'static [&'static str],
) -> (TargetState, &'static [&'static str]) {
    (state, fields)
}

/// Schema for the many resources that are identified by a unique name only.
fn named(
    name: &'static str,
    endpoint: &'static str,
    object_type: &'static str,
    fields: Vec<FieldSpec>,
) -> ResourceSchema {
    ResourceSchema {
        name,
        endpoint,
        object_type,
        natural_key: &["name"],
        lookup_keys: &["name"],
        states: PRESENT_ABSENT,
        fields,
        required: vec![needs(Present, &["name"]), needs(Absent, &["name"])],
        required_together: Vec::new(),
        slug_source: None,
    }
}

fn with_slug(mut schema: ResourceSchema) -> ResourceSchema {
    schema.slug_source = Some("name");
    schema
}

fn contact() -> ResourceSchema {
    named(
        "contact",
        "tenancy/contacts",
        "tenancy.contact",
        vec![
            FieldSpec::text("name"),
            FieldSpec::text("title"),
            FieldSpec::text("phone"),
            FieldSpec::text("email"),
            FieldSpec::text("address"),
            FieldSpec::text("comments"),
            FieldSpec::reference("contact_group", "contact_group")
                .api("group")
                .creatable(),
            FieldSpec::tags(),
            FieldSpec::custom_fields(),
        ],
    )
}

fn data_source() -> ResourceSchema {
    ResourceSchema {
        required: vec![
            needs(Present, &["name", "type", "source_url"]),
            needs(Absent, &["name"]),
        ],
        ..named(
            "data_source",
            "core/data-sources",
            "core.datasource",
            vec![
                FieldSpec::text("name"),
                FieldSpec::text("type").choices(&["local", "git", "amazon-s3"]),
                FieldSpec::text("source_url"),
                FieldSpec::boolean("enabled"),
                FieldSpec::text("description"),
                FieldSpec::text("comments"),
                FieldSpec::mapping("parameters"),
                FieldSpec::text("ignore_rules"),
                FieldSpec::tags(),
                FieldSpec::custom_fields(),
            ],
        )
    }
}

fn journal_entry() -> ResourceSchema {
    ResourceSchema {
        name: "journal_entry",
        endpoint: "extras/journal-entries",
        object_type: "extras.journalentry",
        natural_key: &[],
        lookup_keys: &["id"],
        states: &[New],
        fields: vec![
            FieldSpec::reference("created_by", "user"),
            FieldSpec::text("kind").choices(&["info", "success", "warning", "danger"]),
            FieldSpec::text("assigned_object_type"),
            FieldSpec::integer("assigned_object_id"),
            FieldSpec::text("comments"),
            FieldSpec::tags(),
            FieldSpec::custom_fields(),
        ],
        required: vec![needs(
            New,
            &["comments", "assigned_object_type", "assigned_object_id"],
        )],
        required_together: Vec::new(),
        slug_source: None,
    }
}

fn rack_reservation() -> ResourceSchema {
    ResourceSchema {
        name: "rack_reservation",
        endpoint: "dcim/rack-reservations",
        object_type: "dcim.rackreservation",
        natural_key: &["rack", "description"],
        lookup_keys: &["id"],
        states: PRESENT_ABSENT,
        fields: vec![
            FieldSpec::reference("rack", "rack"),
            FieldSpec::sequence("units", FieldKind::Integer),
            FieldSpec::reference("user", "user"),
            FieldSpec::reference("tenant", "tenant"),
            FieldSpec::text("description"),
            FieldSpec::text("comments"),
            FieldSpec::tags(),
            FieldSpec::custom_fields(),
        ],
        required: vec![
            needs(Present, &["rack", "description"]),
            needs(Absent, &["rack", "description"]),
        ],
        required_together: Vec::new(),
        slug_source: None,
    }
}

fn cluster() -> ResourceSchema {
    ResourceSchema {
        required_together: vec![CLUSTER_SCOPE],
        ..named(
            "cluster",
            "virtualization/clusters",
            "virtualization.cluster",
            vec![
                FieldSpec::text("name"),
                FieldSpec::text("status").choices(&[
                    "planned",
                    "staging",
                    "active",
                    "decommissioning",
                    "offline",
                ]),
                FieldSpec::reference("cluster_type", "cluster_type")
                    .api("type")
                    .creatable(),
                FieldSpec::reference("cluster_group", "cluster_group")
                    .api("group")
                    .creatable(),
                FieldSpec::text("scope_type").choices(&[
                    "dcim.location",
                    "dcim.rack",
                    "dcim.region",
                    "dcim.site",
                    "dcim.sitegroup",
                ]),
                FieldSpec::scoped("scope", "scope_type").api("scope_id"),
                FieldSpec::reference("tenant", "tenant"),
                FieldSpec::text("description"),
                FieldSpec::text("comments"),
                FieldSpec::tags(),
                FieldSpec::custom_fields(),
            ],
        )
    }
}

fn console_port() -> ResourceSchema {
    ResourceSchema {
        name: "console_port",
        endpoint: "dcim/console-ports",
        object_type: "dcim.consoleport",
        natural_key: &["device", "name"],
        lookup_keys: &["name"],
        states: PRESENT_ABSENT,
        fields: vec![
            FieldSpec::reference("device", "device"),
            FieldSpec::text("name"),
            FieldSpec::text("type").choices(&[
                "de-9",
                "db-25",
                "rj-11",
                "rj-12",
                "rj-45",
                "mini-din-8",
                "usb-a",
                "usb-b",
                "usb-c",
                "usb-mini-a",
                "usb-mini-b",
                "usb-micro-a",
                "usb-micro-b",
                "usb-micro-ab",
                "other",
            ]),
            FieldSpec::integer("module"),
            FieldSpec::text("label"),
            FieldSpec::boolean("mark_connected"),
            FieldSpec::integer("speed").choices(&[
                "1200", "2400", "4800", "9600", "19200", "38400", "57600", "115200",
            ]),
            FieldSpec::text("description"),
            FieldSpec::tags(),
            FieldSpec::custom_fields(),
        ],
        required: vec![
            needs(Present, &["device", "name"]),
            needs(Absent, &["device", "name"]),
        ],
        required_together: Vec::new(),
        slug_source: None,
    }
}

fn device_role() -> ResourceSchema {
    with_slug(named(
        "device_role",
        "dcim/device-roles",
        "dcim.devicerole",
        vec![
            FieldSpec::text("name"),
            FieldSpec::text("slug"),
            FieldSpec::text("color"),
            FieldSpec::boolean("vm_role"),
            FieldSpec::text("description"),
            FieldSpec::custom_fields(),
        ],
    ))
}

fn tag() -> ResourceSchema {
    ResourceSchema {
        lookup_keys: &["name", "slug"],
        ..with_slug(named(
            "tag",
            "extras/tags",
            "extras.tag",
            vec![
                FieldSpec::text("name"),
                FieldSpec::text("slug"),
                FieldSpec::text("color"),
                FieldSpec::text("description"),
            ],
        ))
    }
}

fn contact_group() -> ResourceSchema {
    with_slug(named(
        "contact_group",
        "tenancy/contact-groups",
        "tenancy.contactgroup",
        vec![
            FieldSpec::text("name"),
            FieldSpec::text("slug"),
            FieldSpec::reference("parent", "contact_group"),
            FieldSpec::text("description"),
            FieldSpec::tags(),
            FieldSpec::custom_fields(),
        ],
    ))
}

fn tenant() -> ResourceSchema {
    with_slug(named(
        "tenant",
        "tenancy/tenants",
        "tenancy.tenant",
        vec![
            FieldSpec::text("name"),
            FieldSpec::text("slug"),
            FieldSpec::reference("tenant_group", "tenant_group").api("group"),
            FieldSpec::text("description"),
            FieldSpec::text("comments"),
            FieldSpec::tags(),
            FieldSpec::custom_fields(),
        ],
    ))
}

fn tenant_group() -> ResourceSchema {
    with_slug(named(
        "tenant_group",
        "tenancy/tenant-groups",
        "tenancy.tenantgroup",
        vec![
            FieldSpec::text("name"),
            FieldSpec::text("slug"),
            FieldSpec::reference("parent", "tenant_group"),
            FieldSpec::text("description"),
            FieldSpec::tags(),
            FieldSpec::custom_fields(),
        ],
    ))
}

fn site() -> ResourceSchema {
    with_slug(named(
        "site",
        "dcim/sites",
        "dcim.site",
        vec![
            FieldSpec::text("name"),
            FieldSpec::text("slug"),
            FieldSpec::text("status").choices(SITE_STATUS),
            FieldSpec::reference("region", "region"),
            FieldSpec::reference("site_group", "site_group").api("group"),
            FieldSpec::reference("tenant", "tenant"),
            FieldSpec::text("facility"),
            FieldSpec::text("time_zone"),
            FieldSpec::text("description"),
            FieldSpec::text("comments"),
            FieldSpec::tags(),
            FieldSpec::custom_fields(),
        ],
    ))
}

fn region() -> ResourceSchema {
    with_slug(named(
        "region",
        "dcim/regions",
        "dcim.region",
        vec![
            FieldSpec::text("name"),
            FieldSpec::text("slug"),
            FieldSpec::reference("parent", "region"),
            FieldSpec::text("description"),
            FieldSpec::tags(),
            FieldSpec::custom_fields(),
        ],
    ))
}

fn site_group() -> ResourceSchema {
    with_slug(named(
        "site_group",
        "dcim/site-groups",
        "dcim.sitegroup",
        vec![
            FieldSpec::text("name"),
            FieldSpec::text("slug"),
            FieldSpec::reference("parent", "site_group"),
            FieldSpec::text("description"),
            FieldSpec::tags(),
            FieldSpec::custom_fields(),
        ],
    ))
}

fn location() -> ResourceSchema {
    ResourceSchema {
        natural_key: &["site", "name"],
        required: vec![
            needs(Present, &["site", "name"]),
            needs(Absent, &["site", "name"]),
        ],
        ..with_slug(named(
            "location",
            "dcim/locations",
            "dcim.location",
            vec![
                FieldSpec::text("name"),
                FieldSpec::text("slug"),
                FieldSpec::reference("site", "site"),
                FieldSpec::reference("parent", "location"),
                FieldSpec::text("status").choices(SITE_STATUS),
                FieldSpec::reference("tenant", "tenant"),
                FieldSpec::text("description"),
                FieldSpec::tags(),
                FieldSpec::custom_fields(),
            ],
        ))
    }
}

fn rack() -> ResourceSchema {
    ResourceSchema {
        natural_key: &["site", "name"],
        required: vec![
            needs(Present, &["site", "name"]),
            needs(Absent, &["site", "name"]),
        ],
        ..named(
            "rack",
            "dcim/racks",
            "dcim.rack",
            vec![
                FieldSpec::text("name"),
                FieldSpec::reference("site", "site"),
                FieldSpec::reference("location", "location"),
                FieldSpec::reference("tenant", "tenant"),
                FieldSpec::text("status").choices(&[
                    "reserved",
                    "available",
                    "planned",
                    "active",
                    "deprecated",
                ]),
                FieldSpec::integer("u_height"),
                FieldSpec::text("description"),
                FieldSpec::text("comments"),
                FieldSpec::tags(),
                FieldSpec::custom_fields(),
            ],
        )
    }
}

fn device() -> ResourceSchema {
    named(
        "device",
        "dcim/devices",
        "dcim.device",
        vec![
            FieldSpec::text("name"),
            FieldSpec::reference("site", "site"),
            FieldSpec::reference("rack", "rack"),
            FieldSpec::reference("device_role", "device_role").api("role"),
            FieldSpec::reference("tenant", "tenant"),
            FieldSpec::text("status"),
            FieldSpec::text("serial"),
            FieldSpec::text("description"),
            FieldSpec::tags(),
            FieldSpec::custom_fields(),
        ],
    )
}

fn user() -> ResourceSchema {
    ResourceSchema {
        name: "user",
        endpoint: "users/users",
        object_type: "users.user",
        natural_key: &["username"],
        lookup_keys: &["username"],
        states: PRESENT_ABSENT,
        fields: vec![
            FieldSpec::text("username"),
            FieldSpec::text("first_name"),
            FieldSpec::text("last_name"),
            FieldSpec::text("email"),
        ],
        required: vec![
            needs(Present, &["username"]),
            needs(Absent, &["username"]),
        ],
        required_together: Vec::new(),
        slug_source: None,
    }
}

fn cluster_type() -> ResourceSchema {
    with_slug(named(
        "cluster_type",
        "virtualization/cluster-types",
        "virtualization.clustertype",
        vec![
            FieldSpec::text("name"),
            FieldSpec::text("slug"),
            FieldSpec::text("description"),
            FieldSpec::tags(),
            FieldSpec::custom_fields(),
        ],
    ))
}

fn cluster_group() -> ResourceSchema {
    with_slug(named(
        "cluster_group",
        "virtualization/cluster-groups",
        "virtualization.clustergroup",
        vec![
            FieldSpec::text("name"),
            FieldSpec::text("slug"),
            FieldSpec::text("description"),
            FieldSpec::tags(),
            FieldSpec::custom_fields(),
        ],
    ))
}
