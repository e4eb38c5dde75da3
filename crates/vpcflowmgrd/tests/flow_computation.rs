//! End-to-end flow computation over realistic pushed payloads.

use pretty_assertions::assert_eq;

use ovsmgr_vpcflowmgrd::{flows, tunnel_port_name, VpcPayload};

const TWO_TIER_TOPOLOGY: &str = r#"{
    "vpc": {
        "id": "b6e2b1b0-7b3a-4dd4-8f4c-1de0d60a01c2",
        "cidr": "10.20.0.0/16",
        "hosts": [
            {"id": 3, "ipaddress": "172.16.0.3"},
            {"id": 4, "ipaddress": "172.16.0.4"}
        ],
        "tiers": [
            {
                "networkuuid": "web-net",
                "gatewayip": "10.20.1.1",
                "gatewaymac": "02:00:20:00:01:01",
                "cidr": "10.20.1.0/24",
                "grekey": 2001,
                "aclid": "acl-web"
            },
            {
                "networkuuid": "db-net",
                "gatewayip": "10.20.2.1",
                "gatewaymac": "02:00:20:00:02:01",
                "cidr": "10.20.2.0/24",
                "grekey": 2002,
                "aclid": "acl-db"
            }
        ],
        "vms": [
            {
                "id": 100,
                "hostid": 3,
                "nics": [
                    {
                        "macaddress": "02:00:20:00:aa:01",
                        "ipaddress": "10.20.1.10",
                        "networkuuid": "web-net"
                    }
                ]
            },
            {
                "id": 101,
                "hostid": 4,
                "nics": [
                    {
                        "macaddress": "02:00:20:00:bb:01",
                        "ipaddress": "10.20.2.10",
                        "networkuuid": "db-net"
                    }
                ]
            }
        ],
        "acls": [
            {
                "id": "acl-web",
                "aclitems": [
                    {
                        "number": 1,
                        "uuid": "web-http",
                        "action": "Allow",
                        "direction": "ingress",
                        "protocol": "tcp",
                        "sourceportstart": 80,
                        "sourceportend": 80,
                        "sourcecidrs": ["0.0.0.0/0"]
                    }
                ]
            },
            {
                "id": "acl-db",
                "aclitems": [
                    {
                        "number": 1,
                        "uuid": "db-sql",
                        "action": "Allow",
                        "direction": "ingress",
                        "protocol": "tcp",
                        "sourceportstart": 5432,
                        "sourceportend": 5432,
                        "sourcecidrs": ["10.20.1.0/24"]
                    },
                    {
                        "number": 2,
                        "uuid": "db-egress-lockdown",
                        "action": "Deny",
                        "direction": "egress",
                        "protocol": "ip",
                        "sourcecidrs": ["0.0.0.0/0"]
                    }
                ]
            }
        ]
    }
}"#;

#[test]
fn default_pipeline_covers_every_tier_gateway() {
    let vpc = VpcPayload::parse(TWO_TIER_TOPOLOGY).unwrap();
    let rendered: Vec<String> = flows::default_pipeline_flows(&vpc)
        .iter()
        .map(|f| f.render())
        .collect();

    for gateway_mac in ["02:00:20:00:01:01", "02:00:20:00:02:01"] {
        assert!(
            rendered
                .iter()
                .any(|f| f.contains(&format!("dl_dst={}", gateway_mac))
                    && f.ends_with("resubmit(,5)")),
            "no routed-path classifier rule for {}",
            gateway_mac
        );
    }
}

#[test]
fn local_and_remote_flows_agree_on_rewrite() {
    let vpc = VpcPayload::parse(TWO_TIER_TOPOLOGY).unwrap();
    let web = vpc.tier_for_network("web-net").unwrap();
    let db = vpc.tier_for_network("db-net").unwrap();
    let local_nic = &vpc.vms[0].nics[0];
    let remote_nic = &vpc.vms[1].nics[0];

    let local = flows::local_nic_flows(local_nic, web, 11);
    assert_eq!(
        local[1].render(),
        "hard_timeout=0,idle_timeout=0,priority=1200,table=3,ip,nw_dst=10.20.1.10,\
         actions=mod_dl_src:02:00:20:00:01:01,mod_dl_dst:02:00:20:00:aa:01,resubmit(,4)"
    );

    let remote = flows::remote_nic_flows(remote_nic, db, 12);
    assert_eq!(
        remote[1].render(),
        "hard_timeout=0,idle_timeout=0,priority=1100,table=3,ip,nw_dst=10.20.2.10,\
         actions=mod_dl_src:02:00:20:00:02:01,mod_dl_dst:02:00:20:00:bb:01,output:12"
    );
}

#[test]
fn tunnel_names_follow_the_shared_convention() {
    let vpc = VpcPayload::parse(TWO_TIER_TOPOLOGY).unwrap();
    let db = vpc.tier_for_network("db-net").unwrap();
    assert_eq!(tunnel_port_name(db.grekey, 3, 4), "t2002-3-4");
}

#[test]
fn policy_flows_for_both_tiers() {
    let vpc = VpcPayload::parse(TWO_TIER_TOPOLOGY).unwrap();
    let rendered: Vec<String> = flows::routing_policy_flows(&vpc)
        .unwrap()
        .iter()
        .map(|f| f.render())
        .collect();

    // web tier admits http from anywhere
    assert!(rendered.iter().any(|f| f.contains("table=4")
        && f.contains("tcp,nw_src=0.0.0.0/0,nw_dst=10.20.1.0/24,tp_dst=80")
        && f.ends_with("resubmit(,1)")));

    // db tier admits sql from the web tier only
    assert!(rendered.iter().any(|f| f.contains("table=4")
        && f.contains("nw_src=10.20.1.0/24,nw_dst=10.20.2.0/24,tp_dst=5432")));

    // db tier egress lockdown
    assert!(rendered.iter().any(|f| f.contains("table=5")
        && f.contains("ip,nw_src=10.20.2.0/24,nw_dst=0.0.0.0/0")
        && f.ends_with("drop")));

    // explicit rules exist in both directions, so no defaults
    assert!(!rendered.iter().any(|f| f.contains("priority=0,table=4")));
    assert!(!rendered.iter().any(|f| f.contains("priority=0,table=5")));
}

#[test]
fn acl_priorities_order_by_rule_number() {
    let vpc = VpcPayload::parse(TWO_TIER_TOPOLOGY).unwrap();
    let rendered: Vec<String> = flows::routing_policy_flows(&vpc)
        .unwrap()
        .iter()
        .map(|f| f.render())
        .collect();

    assert!(rendered
        .iter()
        .any(|f| f.contains("priority=1001") && f.contains("tp_dst=5432")));
    assert!(rendered
        .iter()
        .any(|f| f.contains("priority=1002") && f.contains("table=5")));
}
